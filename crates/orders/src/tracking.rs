//! Public order tracking codes (`XXXX-XXXX`).

use rand::Rng;
use serde::{Deserialize, Serialize};

use trattoria_core::DomainError;

/// No 0/O, 1/I: easy to read aloud over the phone.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingCode(String);

impl TrackingCode {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let symbols: String = (0..CODE_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        Self(format!("{}-{}", &symbols[..4], &symbols[4..]))
    }

    /// Accepts any case, with or without the dash.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let compact: String = input
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let valid = compact.len() == CODE_LEN && compact.bytes().all(|b| ALPHABET.contains(&b));
        if !valid {
            return Err(DomainError::validation(format!("invalid tracking code '{}'", input.trim())));
        }
        Ok(Self(format!("{}-{}", &compact[..4], &compact[4..])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TrackingCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_well_formed() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let code = TrackingCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), 9);
            assert_eq!(&code.as_str()[4..5], "-");
            assert_eq!(TrackingCode::parse(code.as_str()).unwrap(), code);
        }
    }

    #[test]
    fn parse_is_lenient_on_case_and_dash() {
        let code = TrackingCode::parse("abcd2345").unwrap();
        assert_eq!(code.as_str(), "ABCD-2345");
        assert_eq!(TrackingCode::parse(" abcd-2345 ").unwrap(), code);
    }

    #[test]
    fn parse_rejects_ambiguous_symbols_and_bad_length() {
        assert!(TrackingCode::parse("ABCD-0123").is_err());
        assert!(TrackingCode::parse("ABCD-IO23").is_err());
        assert!(TrackingCode::parse("ABC-234").is_err());
        assert!(TrackingCode::parse("").is_err());
    }
}
