use crate::Result;
use subcoin_runes::RunestoneSpec;

#[derive(Debug, clap::Parser)]
pub struct Encode {
    /// Runestone description, for example
    /// `{"etching":{"rune":"HELLO•RUNES","premine":1000},"edicts":[]}`.
    pub spec: String,
}

impl Encode {
    /// Returns the script hex and, for named etchings, the commitment to reveal.
    pub fn execute(self) -> Result<String> {
        let spec: RunestoneSpec = serde_json::from_str(&self.spec)?;
        let encoded = spec.encode()?;

        let mut output = format!("script: {}", hex::encode(encoded.script.as_bytes()));
        if let Some(commitment) = encoded.commitment {
            output.push_str(&format!("\ncommitment: {}", hex::encode(commitment)));
        }

        Ok(output)
    }
}
