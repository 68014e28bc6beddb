use super::errors::PasswordError;

/// Length bounds applied to new passwords.
///
/// The upper bound keeps Argon2 input sizes reasonable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl PasswordPolicy {
    /// Check a candidate password against the policy.
    ///
    /// # Errors
    /// * `TooShort` - Fewer characters than `min_length`
    /// * `TooLong` - More characters than `max_length`
    pub fn check(&self, password: &str) -> Result<(), PasswordError> {
        let length = password.chars().count();
        if length < self.min_length {
            Err(PasswordError::TooShort {
                min: self.min_length,
            })
        } else if length > self.max_length {
            Err(PasswordError::TooLong {
                max: self.max_length,
            })
        } else {
            Ok(())
        }
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}
