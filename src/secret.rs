//! Secret/salt management and access-code hashing (`SECRET`, `SALT`
//! environment variables). If no `SECRET` is configured, one is
//! generated on first start and persisted to `Config::secret_file`,
//! locked the same way `state_store` locks `status.json`.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

use nix::fcntl::{flock, FlockArg};
use rand::Rng;
use sha2::{Digest, Sha256};

const GENERATED_SECRET_LEN: usize = 32;

/// Loads the persisted secret from `path`, generating and writing a
/// fresh one if the file is absent.
pub fn load_or_generate(path: &str) -> std::io::Result<String> {
    if let Some(existing) = read_existing(path) {
        return Ok(existing);
    }
    let generated = generate_secret();
    write_secret(path, &generated)?;
    Ok(generated)
}

fn read_existing(path: &str) -> Option<String> {
    let mut file = OpenOptions::new().read(true).open(path).ok()?;
    flock(file.as_raw_fd(), FlockArg::LockShared).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    let _ = flock(file.as_raw_fd(), FlockArg::Unlock);
    let trimmed = contents.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn write_secret(path: &str, secret: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    flock(file.as_raw_fd(), FlockArg::LockExclusive)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.write_all(secret.as_bytes())?;
    flock(file.as_raw_fd(), FlockArg::Unlock).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    Ok(())
}

fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..GENERATED_SECRET_LEN).map(|_| rng.random()).collect();
    hex::encode(bytes)
}

/// Salted hash for a keypad access code or PIN.
/// `salt` mixes in the installation-wide
/// `SALT` so the same four-digit PIN hashes differently per install.
pub fn hash_access_code(code: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash for a presented card number (not a secret a human types, so a
/// plain salted digest is enough; no need for `bcrypt`'s deliberate
/// slowness here).
pub fn hash_card_number(card_number: &str, salt: &str) -> String {
    hash_access_code(card_number, salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.env");
        let first = load_or_generate(path.to_str().unwrap()).unwrap();
        let second = load_or_generate(path.to_str().unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn different_salts_give_different_hashes() {
        let a = hash_access_code("1234", "salt-a");
        let b = hash_access_code("1234", "salt-b");
        assert_ne!(a, b);
    }

    #[test]
    fn same_input_is_deterministic() {
        assert_eq!(hash_access_code("1234", "s"), hash_access_code("1234", "s"));
    }
}
