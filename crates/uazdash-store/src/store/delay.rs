use super::Store;
use tracing::{info, warn};
use uazdash_core::{delay::DelayConfig, error::UazError};

/// Storage key of the delay configuration document.
pub const DELAY_CONFIG_KEY: &str = "uaz_delay_config";

impl Store {
    /// The saved delay config, or the default when none was saved or the
    /// saved document cannot be decoded or holds out-of-range values.
    pub async fn load_delay_config(&self) -> Result<DelayConfig, UazError> {
        match self.get_json::<DelayConfig>(DELAY_CONFIG_KEY).await {
            Ok(Some(cfg)) => match cfg.validate() {
                Ok(()) => Ok(cfg),
                Err(e) => {
                    warn!("stored {DELAY_CONFIG_KEY} is out of range, using defaults: {e}");
                    Ok(DelayConfig::default())
                }
            },
            Ok(None) => Ok(DelayConfig::default()),
            Err(UazError::Serialization(e)) => {
                warn!("stored {DELAY_CONFIG_KEY} is unreadable, using defaults: {e}");
                Ok(DelayConfig::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Validate and persist `config`, replacing whatever was saved.
    pub async fn save_delay_config(&self, config: &DelayConfig) -> Result<(), UazError> {
        config.validate()?;
        self.put_json(DELAY_CONFIG_KEY, config).await?;
        info!("delay config saved");
        Ok(())
    }
}
