use std::collections::BTreeMap;

/// Email bodies known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    ConfirmEmail,
    RecoverPassword,
    RecoverPasswordSuccess,
}

const CONFIRM_EMAIL: &str = r#"<p>Hello {{name}},</p>
<p>Please confirm the address {{email}} to activate your account:</p>
<p><a href="{{linkVerification}}">Confirm my email</a></p>"#;

const RECOVER_PASSWORD: &str = r#"<p>Hello {{name}},</p>
<p>We received a request to reset the password for {{email}}.</p>
<p><a href="{{linkVerification}}">Choose a new password</a></p>
<p>If you did not ask for this, you can ignore this message.</p>"#;

const RECOVER_PASSWORD_SUCCESS: &str = r#"<p>Hello {{name}},</p>
<p>Your password was changed.</p>
<p><a href="{{linkToLoginPage}}">Sign in</a></p>"#;

impl Template {
    pub fn key(self) -> &'static str {
        match self {
            Template::ConfirmEmail => "confirm-email",
            Template::RecoverPassword => "recover-password",
            Template::RecoverPasswordSuccess => "recover-password-success",
        }
    }

    pub fn subject(self) -> &'static str {
        match self {
            Template::ConfirmEmail => "Confirm your email",
            Template::RecoverPassword => "Password recovery",
            Template::RecoverPasswordSuccess => "Password changed successfully",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Template::ConfirmEmail => CONFIRM_EMAIL,
            Template::RecoverPassword => RECOVER_PASSWORD,
            Template::RecoverPasswordSuccess => RECOVER_PASSWORD_SUCCESS,
        }
    }

    /// Substitutes `{{key}}` placeholders. Unknown placeholders are left as-is.
    pub fn render(self, variables: &BTreeMap<String, String>) -> String {
        variables
            .iter()
            .fold(self.body().to_string(), |body, (key, value)| {
                body.replace(&format!("{{{{{key}}}}}"), &escape_html(value))
            })
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
