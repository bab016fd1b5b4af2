use crate::Result;
use bitcoin::Transaction;
use bitcoin::consensus::encode::deserialize_hex;
use subcoin_runes::Runestone;

#[derive(Debug, clap::Parser)]
pub struct Decode {
    /// Hex encoded transaction.
    pub tx_hex: String,
}

impl Decode {
    /// Returns the deciphered artifact as JSON, `null` without runestone.
    pub fn execute(self) -> Result<String> {
        let tx: Transaction = deserialize_hex(self.tx_hex.trim())?;
        let artifact = Runestone::decipher(&tx);
        Ok(serde_json::to_string_pretty(&artifact)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::consensus::encode::serialize_hex;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, ScriptBuf, TxIn, TxOut};

    fn tx_hex(script: &str) -> String {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn::default()],
            output: vec![TxOut {
                value: Amount::ZERO,
                script_pubkey: ScriptBuf::from_bytes(hex::decode(script).unwrap()),
            }],
        };
        serialize_hex(&tx)
    }

    fn decode(script: &str) -> serde_json::Value {
        let output = Decode {
            tx_hex: tx_hex(script),
        }
        .execute()
        .unwrap();
        serde_json::from_str(&output).unwrap()
    }

    #[test]
    fn runestone_as_json() {
        let artifact = decode("6a5d021600");
        assert_eq!(artifact["runestone"]["pointer"], 0);
        assert_eq!(artifact["runestone"]["edicts"], serde_json::json!([]));
    }

    #[test]
    fn cenotaph_lists_flaws() {
        let artifact = decode("6a5d0180");
        assert_eq!(artifact["cenotaph"]["flaws"], serde_json::json!(["varint"]));
    }

    #[test]
    fn no_runestone_is_null() {
        assert_eq!(decode("6a"), serde_json::Value::Null);
    }

    #[test]
    fn malformed_hex_is_an_error() {
        let err = Decode {
            tx_hex: "zz".to_string(),
        }
        .execute()
        .unwrap_err();
        assert!(matches!(err, crate::Error::Transaction(_)));
    }
}
