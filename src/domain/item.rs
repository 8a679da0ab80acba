use serde::Deserialize;

/// Ties a user facing item name to one value of one device.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct ItemBinding {
    pub binding: String,
    pub address: String,
    #[serde(default)]
    pub channel: Option<u32>,
    pub value_name: String,
}

impl ItemBinding {
    pub fn new(binding: impl Into<String>, address: impl Into<String>, channel: Option<u32>, value_name: impl Into<String>) -> Self {
        ItemBinding {
            binding: binding.into(),
            address: address.into(),
            channel,
            value_name: value_name.into(),
        }
    }

    /// The address the bound value is published under.
    pub fn value_address(&self) -> String {
        match self.channel {
            Some(index) => format!("{}:{}", self.address, index),
            None => self.address.clone(),
        }
    }

    pub fn matches(&self, value_address: &str, value_name: &str) -> bool {
        self.value_name == value_name && self.value_address() == value_address
    }
}
