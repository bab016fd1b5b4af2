use crate::tag::{Fields, Tag};
use crate::{Edict, Flaw, RuneId};
use bitcoin::Transaction;

/// Payload integers split into fields and the edict body.
pub(crate) struct Message {
    pub(crate) flaws: Vec<Flaw>,
    pub(crate) edicts: Vec<Edict>,
    pub(crate) fields: Fields,
}

impl Message {
    pub(crate) fn from_integers(tx: &Transaction, payload: &[u128]) -> Self {
        let mut edicts = Vec::new();
        let mut fields = Fields::new();
        let mut flaws = Vec::new();

        for i in (0..payload.len()).step_by(2) {
            let tag = payload[i];

            if Tag::Body == tag {
                let mut id = RuneId::default();
                for chunk in payload[i + 1..].chunks(4) {
                    if chunk.len() != 4 {
                        flaws.push(Flaw::TrailingIntegers);
                        break;
                    }

                    let Some(next) = id.next(chunk[0], chunk[1]) else {
                        flaws.push(Flaw::EdictRuneId);
                        break;
                    };

                    let Some(edict) = Edict::from_integers(tx, next, chunk[2], chunk[3]) else {
                        flaws.push(Flaw::EdictOutput);
                        break;
                    };

                    id = next;
                    edicts.push(edict);
                }
                break;
            }

            let Some(&value) = payload.get(i + 1) else {
                flaws.push(Flaw::TruncatedField);
                break;
            };

            fields.entry(tag).or_default().push_back(value);
        }

        Self {
            flaws,
            edicts,
            fields,
        }
    }
}
