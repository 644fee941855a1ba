use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::CursorError;

type HmacSha256 = Hmac<Sha256>;

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";
const SEPARATORS: &str = "cfhistuCFHISTU";
const SEPARATOR_RATIO: f64 = 3.5;
const GUARD_RATIO: f64 = 12.0;

/// Salted, reversible encoder between row IDs and short alphanumeric tokens.
///
/// The alphabet is permuted by the salt, each number is written in that
/// alphabet after a per-token "lottery" reshuffle, and short tokens are padded
/// with guard characters and alphabet halves up to `min_length`.
///
/// The salt permutation alone does not authenticate anything: a token minted
/// under another salt, or an arbitrary string, still round-trips here often
/// enough to yield some other ID. Every token therefore carries a trailing
/// 32-bit HMAC-SHA256 tag over its IDs, keyed by the salt. Decoding rejects
/// tokens that do not re-encode to the same string and tokens whose tag does
/// not verify under this codec's key.
///
/// Only non-negative values are representable; decoded values above
/// `i64::MAX` are rejected as out of range.
#[derive(Debug, Clone)]
pub struct CursorCodec {
    key: Vec<u8>,
    salt: Vec<char>,
    min_length: usize,
    alphabet: Vec<char>,
    separators: Vec<char>,
    guards: Vec<char>,
}

impl CursorCodec {
    pub fn new(salt: &str, min_length: usize) -> Self {
        let key = salt.as_bytes().to_vec();
        let salt: Vec<char> = salt.chars().collect();

        let mut alphabet: Vec<char> = ALPHABET.chars().collect();
        let mut separators: Vec<char> = SEPARATORS.chars().collect();
        alphabet.retain(|c| !separators.contains(c));
        consistent_shuffle(&mut separators, &salt);

        // keep roughly one separator for every 3.5 alphabet characters
        if alphabet.len() as f64 / separators.len() as f64 > SEPARATOR_RATIO {
            let wanted = ((alphabet.len() as f64 / SEPARATOR_RATIO).ceil() as usize).max(2);
            if wanted > separators.len() {
                let missing = wanted - separators.len();
                separators.extend(alphabet.drain(..missing));
            } else {
                separators.truncate(wanted);
            }
        }

        consistent_shuffle(&mut alphabet, &salt);
        let guard_count = (alphabet.len() as f64 / GUARD_RATIO).ceil() as usize;
        let guards: Vec<char> = alphabet.drain(..guard_count).collect();

        Self {
            key,
            salt,
            min_length,
            alphabet,
            separators,
            guards,
        }
    }

    /// Build a codec whose salt is derived from the deployment's signing key.
    pub fn from_key_material(key: &[u8], min_length: usize) -> Self {
        let salt = hex::encode(Sha256::digest(key));
        Self::new(&salt, min_length)
    }

    pub fn encode(&self, ids: &[i64]) -> Result<String, CursorError> {
        if ids.is_empty() {
            return Err(CursorError::Empty);
        }
        let mut numbers = ids
            .iter()
            .map(|&id| u64::try_from(id).map_err(|_| CursorError::NegativeId(id)))
            .collect::<Result<Vec<_>, _>>()?;

        numbers.push(self.tag(&numbers)?);
        Ok(self.encode_numbers(&numbers))
    }

    /// Seal raw numbers with their tag; encodes values `encode` refuses.
    #[cfg(test)]
    fn seal(&self, numbers: &[u64]) -> String {
        let mut sealed = numbers.to_vec();
        sealed.push(self.tag(numbers).unwrap());
        self.encode_numbers(&sealed)
    }

    pub fn decode(&self, token: &str) -> Result<Vec<i64>, CursorError> {
        if token.is_empty() {
            return Err(CursorError::Malformed);
        }

        let chars: Vec<char> = token.chars().collect();
        let parts: Vec<&[char]> = chars.split(|c| self.guards.contains(c)).collect();
        let body = match parts.len() {
            2 | 3 => parts[1],
            _ => parts[0],
        };
        let (&lottery, rest) = body.split_first().ok_or(CursorError::Malformed)?;

        let mut alphabet = self.alphabet.clone();
        let mut numbers = Vec::new();
        for chunk in rest.split(|c| self.separators.contains(c)) {
            self.reshuffle(&mut alphabet, lottery);
            let number = from_alphabet(chunk, &alphabet).ok_or(CursorError::Malformed)?;
            numbers.push(number);
        }

        if self.encode_numbers(&numbers) != token {
            return Err(CursorError::Mismatch);
        }

        let (tag, ids) = match numbers.split_last() {
            Some((tag, ids)) if !ids.is_empty() => (*tag, ids),
            _ => return Err(CursorError::Malformed),
        };
        if self.tag(ids)? != tag {
            return Err(CursorError::Mismatch);
        }

        ids.iter()
            .copied()
            .map(|n| i64::try_from(n).map_err(|_| CursorError::OutOfRange))
            .collect()
    }

    fn encode_numbers(&self, numbers: &[u64]) -> String {
        let mut alphabet = self.alphabet.clone();
        let numbers_hash: u64 = numbers
            .iter()
            .enumerate()
            .map(|(i, n)| n % (i as u64 + 100))
            .sum();

        let lottery = alphabet[(numbers_hash % alphabet.len() as u64) as usize];
        let mut out = vec![lottery];

        for (i, &number) in numbers.iter().enumerate() {
            self.reshuffle(&mut alphabet, lottery);
            let digits = to_alphabet(number, &alphabet);
            out.extend_from_slice(&digits);

            if i + 1 < numbers.len() {
                let n = number % (digits[0] as u64 + i as u64);
                out.push(self.separators[(n % self.separators.len() as u64) as usize]);
            }
        }

        if out.len() < self.min_length {
            let idx = (numbers_hash + out[0] as u64) % self.guards.len() as u64;
            out.insert(0, self.guards[idx as usize]);

            if out.len() < self.min_length {
                let idx = (numbers_hash + out[2] as u64) % self.guards.len() as u64;
                out.push(self.guards[idx as usize]);
            }
        }

        let half = alphabet.len() / 2;
        while out.len() < self.min_length {
            let key = alphabet.clone();
            consistent_shuffle(&mut alphabet, &key);

            let mut padded = Vec::with_capacity(out.len() + alphabet.len());
            padded.extend_from_slice(&alphabet[half..]);
            padded.extend_from_slice(&out);
            padded.extend_from_slice(&alphabet[..half]);
            out = padded;

            let excess = out.len().saturating_sub(self.min_length);
            if excess > 0 {
                let start = excess / 2;
                out = out[start..start + self.min_length].to_vec();
            }
        }

        out.into_iter().collect()
    }

    /// First four bytes of HMAC-SHA256 over the big-endian numbers.
    fn tag(&self, numbers: &[u64]) -> Result<u64, CursorError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| CursorError::Key(format!("HMAC error: {}", e)))?;
        for n in numbers {
            mac.update(&n.to_be_bytes());
        }
        let bytes = mac.finalize().into_bytes();

        Ok(u64::from(u32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])))
    }

    /// Per-number alphabet permutation keyed by lottery + salt.
    fn reshuffle(&self, alphabet: &mut [char], lottery: char) {
        let mut key = Vec::with_capacity(1 + self.salt.len() + alphabet.len());
        key.push(lottery);
        key.extend_from_slice(&self.salt);
        key.extend_from_slice(alphabet);
        key.truncate(alphabet.len());
        consistent_shuffle(alphabet, &key);
    }
}

fn consistent_shuffle(alphabet: &mut [char], salt: &[char]) {
    if salt.is_empty() {
        return;
    }

    let mut v = 0usize;
    let mut p = 0usize;
    for i in (1..alphabet.len()).rev() {
        v %= salt.len();
        let n = salt[v] as usize;
        p += n;
        let j = (n + v + p) % i;
        alphabet.swap(i, j);
        v += 1;
    }
}

fn to_alphabet(mut input: u64, alphabet: &[char]) -> Vec<char> {
    let base = alphabet.len() as u64;
    let mut digits = Vec::new();
    loop {
        digits.push(alphabet[(input % base) as usize]);
        input /= base;
        if input == 0 {
            break;
        }
    }
    digits.reverse();
    digits
}

fn from_alphabet(input: &[char], alphabet: &[char]) -> Option<u64> {
    let base = alphabet.len() as u64;
    input.iter().try_fold(0u64, |acc, c| {
        let digit = alphabet.iter().position(|a| a == c)? as u64;
        acc.checked_mul(base)?.checked_add(digit)
    })
}
