use bitcoin::Network;
use bitcoin::opcodes::{Opcode, all::OP_PUSHNUM_13};

/// Opcode following `OP_RETURN` that marks an output as a runestone.
pub const MAGIC_NUMBER: Opcode = OP_PUSHNUM_13;

/// Maximum number of decimal places a rune may be divided into.
pub const MAX_DIVISIBILITY: u8 = 38;

/// Largest spacer bitmask, one bit per boundary between the 28 letters of the longest rune.
pub const MAX_SPACERS: u32 = 0b0111_1111_1111_1111_1111_1111_1111;

/// Number of confirmations a commit transaction needs before its rune may be etched.
pub const COMMIT_CONFIRMATIONS: u32 = 6;

pub const SUBSIDY_HALVING_INTERVAL: u32 = 210_000;

/// Maximum size of a single data push, runestone payloads are chunked to this size.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Returns the height at which runes activate on the given network.
pub fn first_rune_height(network: Network) -> u32 {
    match network {
        Network::Bitcoin => SUBSIDY_HALVING_INTERVAL * 4,
        Network::Testnet => SUBSIDY_HALVING_INTERVAL * 12,
        _ => 0,
    }
}
