use std::fmt;

/// An email address taken from a MAIL or RCPT command.
///
/// The address is kept exactly as the client sent it, no validation is done
/// beyond extracting it from the command.
///
/// ```
/// use smtpd::Address;
///
/// let addr = Address::new("user@EXAMPLE.com");
/// assert_eq!(addr.email(), "user@EXAMPLE.com");
/// assert_eq!(addr.domain(), "example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Create an address from the raw text sent by the client
    pub fn new<S: Into<String>>(email: S) -> Self {
        Self(email.into())
    }

    /// The address as provided by the client
    pub fn email(&self) -> &str {
        &self.0
    }

    /// The lowercase domain part, or an empty string if there is no `@`
    pub fn domain(&self) -> String {
        match self.0.rfind('@') {
            Some(idx) => self.0[idx + 1..].to_lowercase(),
            None => String::new(),
        }
    }

    /// True for the null reverse path, `<>`
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
