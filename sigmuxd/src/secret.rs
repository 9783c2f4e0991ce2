use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use sigmux_lib::{Entropy, Identity, PublicKey, Sign, Signature};
use std::{path::PathBuf, sync::Arc};
use structopt::StructOpt;

/// the node's signing identity
#[derive(Clone, Debug)]
pub struct Secret {
    identity: Arc<Identity>,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize, StructOpt)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// path to the entropy file
    ///
    #[structopt(
        long = "entropy",
        default_value = "entropy.txt",
        env = "SIGMUXD_ENTROPY_FILE"
    )]
    #[serde(default = "default_entropy")]
    pub entropy: PathBuf,

    /// password to derive the entropy to the private key
    ///
    /// if not set, the service will ask for it
    #[structopt(long = "password", env = "SIGMUXD_PASSWORD", hide_env_values = true)]
    #[serde(skip)]
    #[serde(default)]
    pub password: Option<String>,
}

impl Secret {
    pub fn new(config: Config) -> Result<Self> {
        let entropy: Entropy = std::fs::read_to_string(&config.entropy)
            .with_context(|| format!("Cannot open the entropy file {}", config.entropy.display()))?
            .parse()
            .with_context(|| {
                format!(
                    "Cannot parse the entropy file: {}",
                    config.entropy.display()
                )
            })?;

        let password = if let Some(password) = config.password {
            password
        } else {
            dialoguer::Password::new()
                .allow_empty_password(true)
                .with_prompt("Enter the secret key password")
                .interact()
                .context("Cannot retrieve the entropy password")?
        };

        let secret = Self::derive(&entropy, password);

        tracing::info!(public = %secret.public_key(), "secret loaded");

        Ok(secret)
    }

    pub fn derive<P>(entropy: &Entropy, password: P) -> Self
    where
        P: AsRef<[u8]>,
    {
        Self {
            identity: Arc::new(entropy.derive_identity(password)),
        }
    }
}

impl Sign for Secret {
    fn public_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    fn sign(&self, message: &[u8]) -> Signature {
        self.identity.sign(message)
    }
}

fn default_entropy() -> PathBuf {
    PathBuf::from("entropy.txt")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entropy: default_entropy(),
            password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng as _};

    fn entropy() -> Entropy {
        Entropy::generate(StdRng::seed_from_u64(42))
    }

    #[test]
    fn load_from_file() {
        let entropy = entropy();
        let path = std::env::temp_dir().join(format!("sigmuxd-entropy-{}.txt", std::process::id()));
        std::fs::write(&path, format!("{}\n", entropy)).unwrap();

        let secret = Secret::new(Config {
            entropy: path.clone(),
            password: Some("password".to_owned()),
        })
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            secret.public_key(),
            Secret::derive(&entropy, "password").public_key()
        );
    }

    #[test]
    fn password_from_the_environment() {
        std::env::set_var("SIGMUXD_PASSWORD", "from the environment");

        let config = Config::from_iter_safe(vec!["sigmuxd"]).unwrap();

        assert_eq!(config.password.as_deref(), Some("from the environment"));
    }

    #[test]
    fn missing_entropy_file() {
        let config = Config {
            entropy: PathBuf::from("this/file/does/not/exist.txt"),
            password: Some("password".to_owned()),
        };

        assert!(Secret::new(config).is_err());
    }
}
