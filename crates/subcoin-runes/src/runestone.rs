use crate::constants::{MAGIC_NUMBER, MAX_DIVISIBILITY, MAX_SCRIPT_ELEMENT_SIZE, MAX_SPACERS};
use crate::message::Message;
use crate::tag::Tag;
use crate::{Artifact, Cenotaph, Edict, Etching, Flags, Flaw, Rune, RuneId, Terms, varint};
use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::{self, Instruction, PushBytes};
use bitcoin::{ScriptBuf, Transaction};
use serde::{Deserialize, Serialize};

/// A well formed runestone.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runestone {
    pub edicts: Vec<Edict>,
    pub etching: Option<Etching>,
    pub mint: Option<RuneId>,
    pub pointer: Option<u32>,
}

enum Payload {
    Valid(Vec<u8>),
    Invalid(Flaw),
}

impl Runestone {
    /// Deciphers the first runestone output of `transaction`.
    ///
    /// Returns `None` when no output starts with `OP_RETURN OP_13`. Malformed payloads never
    /// fail, they produce a [`Cenotaph`] listing the flaws found.
    pub fn decipher(transaction: &Transaction) -> Option<Artifact> {
        let payload = match Self::payload(transaction)? {
            Payload::Valid(payload) => payload,
            Payload::Invalid(flaw) => {
                return Some(Artifact::Cenotaph(Cenotaph {
                    flaws: vec![flaw],
                    ..Default::default()
                }));
            }
        };

        let Ok(integers) = varint::decode_all(&payload) else {
            return Some(Artifact::Cenotaph(Cenotaph {
                flaws: vec![Flaw::Varint],
                ..Default::default()
            }));
        };

        let Message {
            mut flaws,
            edicts,
            mut fields,
        } = Message::from_integers(transaction, &integers);

        let mut flags = Tag::Flags
            .take(&mut fields, |[flags]| Some(Flags::from_bits_retain(flags)))
            .unwrap_or_default();

        let etching = flags.take(Flags::ETCHING);
        let terms = flags.take(Flags::TERMS);
        let turbo = flags.take(Flags::TURBO);

        let mint = Tag::Mint.take(&mut fields, |[block, tx]| {
            RuneId::new(block.try_into().ok()?, tx.try_into().ok()?)
        });

        let pointer = Tag::Pointer.take(&mut fields, |[pointer]| {
            let pointer = u32::try_from(pointer).ok()?;
            (usize::try_from(pointer).ok()? < transaction.output.len()).then_some(pointer)
        });

        let divisibility = Tag::Divisibility.take(&mut fields, |[divisibility]| {
            let divisibility = u8::try_from(divisibility).ok()?;
            (divisibility <= MAX_DIVISIBILITY).then_some(divisibility)
        });

        let amount = Tag::Amount.take(&mut fields, |[amount]| Some(amount));
        let rune = Tag::Rune.take(&mut fields, |[rune]| Some(Rune(rune)));
        let cap = Tag::Cap.take(&mut fields, |[cap]| Some(cap));
        let premine = Tag::Premine.take(&mut fields, |[premine]| Some(premine));

        let spacers = Tag::Spacers.take(&mut fields, |[spacers]| {
            let spacers = u32::try_from(spacers).ok()?;
            (spacers <= MAX_SPACERS).then_some(spacers)
        });

        let symbol = Tag::Symbol.take(&mut fields, |[symbol]| {
            char::from_u32(u32::try_from(symbol).ok()?)
        });

        let offset = (
            Tag::OffsetStart.take(&mut fields, |[start]| u64::try_from(start).ok()),
            Tag::OffsetEnd.take(&mut fields, |[end]| u64::try_from(end).ok()),
        );

        let height = (
            Tag::HeightStart.take(&mut fields, |[start]| u64::try_from(start).ok()),
            Tag::HeightEnd.take(&mut fields, |[end]| u64::try_from(end).ok()),
        );

        let etching = etching.then_some(Etching {
            divisibility,
            premine,
            rune,
            spacers,
            symbol,
            terms: terms.then_some(Terms {
                amount,
                cap,
                height,
                offset,
            }),
            turbo,
        });

        if etching.is_some_and(|etching| etching.supply().is_none()) {
            flaws.push(Flaw::SupplyOverflow);
        }

        if !flags.is_empty() {
            flaws.push(Flaw::UnrecognizedFlag);
        }

        if fields.keys().any(|tag| tag % 2 == 0) {
            flaws.push(Flaw::UnrecognizedEvenTag);
        }

        if !flaws.is_empty() {
            return Some(Artifact::Cenotaph(Cenotaph {
                flaws,
                rune: etching.and_then(|etching| etching.rune),
                mint,
            }));
        }

        Some(Artifact::Runestone(Self {
            edicts,
            etching,
            mint,
            pointer,
        }))
    }

    /// Encodes this runestone as an `OP_RETURN` script.
    pub fn encipher(&self) -> ScriptBuf {
        let mut payload = Vec::new();

        if let Some(etching) = self.etching {
            let mut flags = Flags::ETCHING;

            if etching.terms.is_some() {
                flags |= Flags::TERMS;
            }

            if etching.turbo {
                flags |= Flags::TURBO;
            }

            Tag::Flags.encode([flags.bits()], &mut payload);

            Tag::Rune.encode_option(etching.rune.map(|rune| rune.0), &mut payload);
            Tag::Divisibility.encode_option(etching.divisibility, &mut payload);
            Tag::Spacers.encode_option(etching.spacers, &mut payload);
            Tag::Symbol.encode_option(etching.symbol.map(u32::from), &mut payload);
            Tag::Premine.encode_option(etching.premine, &mut payload);

            if let Some(terms) = etching.terms {
                Tag::Amount.encode_option(terms.amount, &mut payload);
                Tag::Cap.encode_option(terms.cap, &mut payload);
                Tag::HeightStart.encode_option(terms.height.0, &mut payload);
                Tag::HeightEnd.encode_option(terms.height.1, &mut payload);
                Tag::OffsetStart.encode_option(terms.offset.0, &mut payload);
                Tag::OffsetEnd.encode_option(terms.offset.1, &mut payload);
            }
        }

        if let Some(RuneId { block, tx }) = self.mint {
            Tag::Mint.encode([block.into(), tx.into()], &mut payload);
        }

        Tag::Pointer.encode_option(self.pointer, &mut payload);

        if !self.edicts.is_empty() {
            varint::encode_to_vec(Tag::Body.into(), &mut payload);

            let mut edicts = self.edicts.clone();
            edicts.sort_by_key(|edict| edict.id);

            let mut previous = RuneId::default();
            for edict in edicts {
                let (block, tx) = previous
                    .delta(edict.id)
                    .expect("Edicts are sorted by id; qed");
                varint::encode_to_vec(block, &mut payload);
                varint::encode_to_vec(tx, &mut payload);
                varint::encode_to_vec(edict.amount, &mut payload);
                varint::encode_to_vec(edict.output.into(), &mut payload);
                previous = edict.id;
            }
        }

        let mut builder = script::Builder::new()
            .push_opcode(OP_RETURN)
            .push_opcode(MAGIC_NUMBER);

        for chunk in payload.chunks(MAX_SCRIPT_ELEMENT_SIZE) {
            let push: &PushBytes = chunk
                .try_into()
                .expect("Chunks never exceed the maximum push size; qed");
            builder = builder.push_slice(push);
        }

        builder.into_script()
    }

    fn payload(transaction: &Transaction) -> Option<Payload> {
        for output in &transaction.output {
            let mut instructions = output.script_pubkey.instructions();

            if instructions.next() != Some(Ok(Instruction::Op(OP_RETURN))) {
                continue;
            }

            if instructions.next() != Some(Ok(Instruction::Op(MAGIC_NUMBER))) {
                continue;
            }

            let mut payload = Vec::new();

            for result in instructions {
                match result {
                    Ok(Instruction::PushBytes(push)) => payload.extend_from_slice(push.as_bytes()),
                    Ok(Instruction::Op(_)) => return Some(Payload::Invalid(Flaw::Opcode)),
                    Err(_) => return Some(Payload::Invalid(Flaw::InvalidScript)),
                }
            }

            return Some(Payload::Valid(payload));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::opcodes::all::{OP_PUSHBYTES_4, OP_VERIFY};
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, TxOut};

    fn tx_out(script_pubkey: ScriptBuf) -> TxOut {
        TxOut {
            value: Amount::ZERO,
            script_pubkey,
        }
    }

    fn transaction(output: Vec<TxOut>) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output,
        }
    }

    fn payload_script(integers: &[u128]) -> ScriptBuf {
        let mut payload = Vec::new();
        for integer in integers {
            varint::encode_to_vec(*integer, &mut payload);
        }

        let push: &PushBytes = payload.as_slice().try_into().unwrap();
        script::Builder::new()
            .push_opcode(OP_RETURN)
            .push_opcode(MAGIC_NUMBER)
            .push_slice(push)
            .into_script()
    }

    fn decipher(integers: &[u128]) -> Artifact {
        decipher_with_outputs(integers, 1)
    }

    fn decipher_with_outputs(integers: &[u128], outputs: usize) -> Artifact {
        let mut output = vec![tx_out(payload_script(integers))];
        output.extend((1..outputs).map(|_| tx_out(ScriptBuf::new())));
        Runestone::decipher(&transaction(output)).unwrap()
    }

    fn cenotaph(flaws: Vec<Flaw>) -> Artifact {
        Artifact::Cenotaph(Cenotaph {
            flaws,
            ..Default::default()
        })
    }

    #[test]
    fn transactions_without_runestone_output() {
        assert_eq!(Runestone::decipher(&transaction(vec![])), None);
        assert_eq!(
            Runestone::decipher(&transaction(vec![tx_out(ScriptBuf::new())])),
            None
        );

        let bare_op_return = script::Builder::new().push_opcode(OP_RETURN).into_script();
        assert_eq!(
            Runestone::decipher(&transaction(vec![tx_out(bare_op_return)])),
            None
        );

        let wrong_magic = script::Builder::new()
            .push_opcode(OP_RETURN)
            .push_opcode(OP_VERIFY)
            .into_script();
        assert_eq!(
            Runestone::decipher(&transaction(vec![tx_out(wrong_magic)])),
            None
        );
    }

    #[test]
    fn first_runestone_output_wins() {
        let tx = transaction(vec![
            tx_out(ScriptBuf::new()),
            tx_out(payload_script(&[Tag::Pointer.into(), 0])),
            tx_out(payload_script(&[Tag::Pointer.into(), 1])),
        ]);

        assert_eq!(
            Runestone::decipher(&tx),
            Some(Artifact::Runestone(Runestone {
                pointer: Some(0),
                ..Default::default()
            }))
        );
    }

    #[test]
    fn empty_payload_is_an_empty_runestone() {
        assert_eq!(decipher(&[]), Artifact::Runestone(Runestone::default()));
    }

    #[test]
    fn non_push_opcode_is_a_cenotaph() {
        let script = script::Builder::new()
            .push_opcode(OP_RETURN)
            .push_opcode(MAGIC_NUMBER)
            .push_opcode(OP_VERIFY)
            .into_script();

        assert_eq!(
            Runestone::decipher(&transaction(vec![tx_out(script)])),
            Some(cenotaph(vec![Flaw::Opcode]))
        );
    }

    #[test]
    fn truncated_push_is_an_invalid_script() {
        let script = ScriptBuf::from_bytes(vec![
            OP_RETURN.to_u8(),
            MAGIC_NUMBER.to_u8(),
            OP_PUSHBYTES_4.to_u8(),
            0x01,
        ]);

        assert_eq!(
            Runestone::decipher(&transaction(vec![tx_out(script)])),
            Some(cenotaph(vec![Flaw::InvalidScript]))
        );
    }

    #[test]
    fn invalid_varint_is_a_cenotaph() {
        let script = script::Builder::new()
            .push_opcode(OP_RETURN)
            .push_opcode(MAGIC_NUMBER)
            .push_slice([0x80])
            .into_script();

        assert_eq!(
            Runestone::decipher(&transaction(vec![tx_out(script)])),
            Some(cenotaph(vec![Flaw::Varint]))
        );
    }

    #[test]
    fn pushes_are_concatenated() {
        let script = script::Builder::new()
            .push_opcode(OP_RETURN)
            .push_opcode(MAGIC_NUMBER)
            .push_slice([Tag::Pointer as u8])
            .push_slice([0])
            .into_script();

        assert_eq!(
            Runestone::decipher(&transaction(vec![tx_out(script)])),
            Some(Artifact::Runestone(Runestone {
                pointer: Some(0),
                ..Default::default()
            }))
        );
    }

    #[test]
    fn edicts_are_delta_decoded() {
        assert_eq!(
            decipher_with_outputs(&[Tag::Body.into(), 1, 1, 100, 0, 0, 2, 50, 1, 1, 0, 7, 2], 2),
            Artifact::Runestone(Runestone {
                edicts: vec![
                    Edict {
                        id: RuneId { block: 1, tx: 1 },
                        amount: 100,
                        output: 0,
                    },
                    Edict {
                        id: RuneId { block: 1, tx: 3 },
                        amount: 50,
                        output: 1,
                    },
                    Edict {
                        id: RuneId { block: 2, tx: 0 },
                        amount: 7,
                        output: 2,
                    },
                ],
                ..Default::default()
            })
        );
    }

    #[test]
    fn trailing_integers_in_body() {
        for trailing in 1..4 {
            let mut integers = vec![Tag::Body.into(), 1, 1, 5, 0];
            integers.extend(std::iter::repeat_n(0, trailing));
            assert_eq!(decipher(&integers), cenotaph(vec![Flaw::TrailingIntegers]));
        }
    }

    #[test]
    fn edict_with_invalid_rune_id() {
        assert_eq!(
            decipher(&[Tag::Body.into(), 0, 1, 5, 0]),
            cenotaph(vec![Flaw::EdictRuneId])
        );
        assert_eq!(
            decipher(&[Tag::Body.into(), u128::from(u64::MAX) + 1, 0, 5, 0]),
            cenotaph(vec![Flaw::EdictRuneId])
        );
    }

    #[test]
    fn edict_output_beyond_outputs() {
        assert_eq!(decipher(&[Tag::Body.into(), 1, 1, 5, 2]), cenotaph(vec![Flaw::EdictOutput]));
        assert!(matches!(
            decipher(&[Tag::Body.into(), 1, 1, 5, 1]),
            Artifact::Runestone(_)
        ));
    }

    #[test]
    fn tag_without_value_is_truncated() {
        assert_eq!(decipher(&[Tag::Flags.into()]), cenotaph(vec![Flaw::TruncatedField]));
        assert_eq!(
            decipher(&[Tag::Pointer.into(), 0, Tag::Nop.into()]),
            Artifact::Cenotaph(Cenotaph {
                flaws: vec![Flaw::TruncatedField],
                ..Default::default()
            })
        );
    }

    #[test]
    fn unrecognized_even_tag_is_a_cenotaph() {
        assert_eq!(decipher(&[128, 0]), cenotaph(vec![Flaw::UnrecognizedEvenTag]));
        assert_eq!(
            decipher(&[Tag::Cenotaph.into(), 0]),
            cenotaph(vec![Flaw::UnrecognizedEvenTag])
        );
    }

    #[test]
    fn unrecognized_odd_tag_is_ignored() {
        assert_eq!(
            decipher(&[Tag::Nop.into(), 5, 129, 1]),
            Artifact::Runestone(Runestone::default())
        );
    }

    #[test]
    fn unrecognized_flags_are_a_cenotaph() {
        assert_eq!(
            decipher(&[Tag::Flags.into(), Flags::CENOTAPH.bits()]),
            cenotaph(vec![Flaw::UnrecognizedFlag])
        );
        assert_eq!(
            decipher(&[Tag::Flags.into(), 1 << 3]),
            cenotaph(vec![Flaw::UnrecognizedFlag])
        );
    }

    #[test]
    fn invalid_pointer_leaves_an_even_tag() {
        assert_eq!(
            decipher_with_outputs(&[Tag::Pointer.into(), 2], 2),
            cenotaph(vec![Flaw::UnrecognizedEvenTag])
        );
    }

    #[test]
    fn invalid_divisibility_is_ignored() {
        assert_eq!(
            decipher(&[
                Tag::Flags.into(),
                Flags::ETCHING.bits(),
                Tag::Divisibility.into(),
                u128::from(MAX_DIVISIBILITY) + 1,
            ]),
            Artifact::Runestone(Runestone {
                etching: Some(Etching::default()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn etching_fields_without_etching_flag() {
        assert_eq!(
            decipher(&[Tag::Rune.into(), 4, Tag::Premine.into(), 1]),
            Artifact::Runestone(Runestone::default())
        );
    }

    #[test]
    fn etching_with_terms() {
        assert_eq!(
            decipher(&[
                Tag::Flags.into(),
                (Flags::ETCHING | Flags::TERMS | Flags::TURBO).bits(),
                Tag::Rune.into(),
                4,
                Tag::Divisibility.into(),
                1,
                Tag::Spacers.into(),
                5,
                Tag::Symbol.into(),
                'a'.into(),
                Tag::Premine.into(),
                8,
                Tag::Amount.into(),
                2,
                Tag::Cap.into(),
                3,
                Tag::HeightStart.into(),
                10,
                Tag::HeightEnd.into(),
                20,
                Tag::OffsetStart.into(),
                1,
                Tag::OffsetEnd.into(),
                9,
            ]),
            Artifact::Runestone(Runestone {
                etching: Some(Etching {
                    divisibility: Some(1),
                    premine: Some(8),
                    rune: Some(Rune(4)),
                    spacers: Some(5),
                    symbol: Some('a'),
                    terms: Some(Terms {
                        amount: Some(2),
                        cap: Some(3),
                        height: (Some(10), Some(20)),
                        offset: (Some(1), Some(9)),
                    }),
                    turbo: true,
                }),
                ..Default::default()
            })
        );
    }

    #[test]
    fn supply_overflow_keeps_the_rune() {
        assert_eq!(
            decipher(&[
                Tag::Flags.into(),
                (Flags::ETCHING | Flags::TERMS).bits(),
                Tag::Rune.into(),
                4,
                Tag::Premine.into(),
                1,
                Tag::Cap.into(),
                u128::MAX,
                Tag::Amount.into(),
                1,
                Tag::Mint.into(),
                1,
                Tag::Mint.into(),
                0,
            ]),
            Artifact::Cenotaph(Cenotaph {
                flaws: vec![Flaw::SupplyOverflow],
                rune: Some(Rune(4)),
                mint: Some(RuneId { block: 1, tx: 0 }),
            })
        );
    }

    #[test]
    fn flaws_accumulate() {
        assert_eq!(
            decipher(&[Tag::Flags.into(), 1 << 5, 128, 0, Tag::Body.into(), 1]),
            cenotaph(vec![
                Flaw::TrailingIntegers,
                Flaw::UnrecognizedFlag,
                Flaw::UnrecognizedEvenTag,
            ])
        );
    }

    #[test]
    fn encipher_known_script() {
        let runestone = Runestone {
            pointer: Some(0),
            ..Default::default()
        };
        assert_eq!(runestone.encipher().to_hex_string(), "6a5d021600");

        assert_eq!(Runestone::default().encipher().to_hex_string(), "6a5d");
    }

    #[test]
    fn encipher_sorts_edicts() {
        let runestone = Runestone {
            edicts: vec![
                Edict {
                    id: RuneId { block: 2, tx: 1 },
                    amount: 3,
                    output: 0,
                },
                Edict {
                    id: RuneId { block: 1, tx: 4 },
                    amount: 5,
                    output: 1,
                },
            ],
            ..Default::default()
        };

        assert_eq!(
            runestone.encipher().to_hex_string(),
            format!("6a5d09{}", "000104050101010300")
        );
    }

    #[test]
    fn encipher_then_decipher() {
        let runestone = Runestone {
            edicts: vec![
                Edict {
                    id: RuneId { block: 840_000, tx: 3 },
                    amount: u128::MAX,
                    output: 2,
                },
                Edict {
                    id: RuneId { block: 840_000, tx: 1 },
                    amount: 0,
                    output: 3,
                },
            ],
            etching: Some(Etching {
                divisibility: Some(MAX_DIVISIBILITY),
                premine: Some(1_000),
                rune: Some(Rune(u128::MAX)),
                spacers: Some(MAX_SPACERS),
                symbol: Some('\u{10FFFF}'),
                terms: Some(Terms {
                    amount: Some(10),
                    cap: Some(100),
                    height: (Some(u64::MAX), None),
                    offset: (None, Some(7)),
                }),
                turbo: true,
            }),
            mint: Some(RuneId { block: 1, tx: 0 }),
            pointer: Some(1),
        };

        let tx = transaction(vec![
            tx_out(runestone.encipher()),
            tx_out(ScriptBuf::new()),
            tx_out(ScriptBuf::new()),
        ]);

        let Some(Artifact::Runestone(deciphered)) = Runestone::decipher(&tx) else {
            panic!("expected a runestone");
        };

        let mut expected = runestone.clone();
        expected.edicts.sort_by_key(|edict| edict.id);
        assert_eq!(deciphered, expected);
    }

    #[test]
    fn large_payload_is_chunked() {
        let edicts = (0..200)
            .map(|i| Edict {
                id: RuneId {
                    block: 840_000 + i,
                    tx: 1,
                },
                amount: u128::MAX,
                output: 0,
            })
            .collect::<Vec<_>>();

        let runestone = Runestone {
            edicts,
            ..Default::default()
        };

        let script = runestone.encipher();
        let pushes = script
            .instructions()
            .filter(|instruction| matches!(instruction, Ok(Instruction::PushBytes(_))))
            .count();
        assert!(pushes > 1);

        assert_eq!(
            Runestone::decipher(&transaction(vec![tx_out(script)])),
            Some(Artifact::Runestone(runestone))
        );
    }
}
