//! Outgoing mail.
//!
//! There is no SMTP transport: the outbox only logs the recipient, subject
//! and body size. Bodies carry temporary passwords and reset links and never
//! reach the log, not even through `Debug`.

use std::fmt;
use zeroize::Zeroize;

#[derive(Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl fmt::Debug for Mail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mail")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("body", &"[REDACTED]")
            .finish()
    }
}

impl Drop for Mail {
    fn drop(&mut self) {
        self.body.zeroize();
    }
}

/// Welcome message with the temporary password of a new professor account.
pub fn welcome_mail(name: &str, surname: &str, email: &str, temporary_password: &str) -> Mail {
    Mail {
        to: email.to_string(),
        subject: "Votre compte a été créé avec succès".to_string(),
        body: format!(
            "Bonjour {} {},\n\nVotre compte a été créé avec succès.\n\
             Voici votre mot de passe temporaire : {}\n\
             Veuillez le changer dès que possible.\n\nCordialement,\nL'équipe.",
            surname, name, temporary_password
        ),
    }
}

/// Password reset link.
pub fn reset_mail(email: &str, link: &str, ttl_minutes: u64) -> Mail {
    Mail {
        to: email.to_string(),
        subject: "Réinitialisation de votre mot de passe".to_string(),
        body: format!(
            "Bonjour,\n\nPour choisir un nouveau mot de passe, ouvrez le lien suivant :\n{}\n\n\
             Ce lien expire dans {} minutes et ne peut être utilisé qu'une fois.\n\
             Si vous n'êtes pas à l'origine de cette demande, ignorez ce message.\n\n\
             Cordialement,\nL'équipe.",
            link, ttl_minutes
        ),
    }
}

/// Hand a message to the outbox.
pub fn deliver(mail: &Mail) {
    tracing::info!(
        to = %mail.to,
        subject = %mail.subject,
        body_bytes = mail.body.len(),
        "Mail queued"
    );
}
