/// Wire constants shared by agencies and the lottery server.
///
/// Both endpoints compile against these values; changing one of them is a
/// protocol break and has to ship to every agency and the server together.

/// Size of the fixed frame header: 1 byte opcode + 4 byte big-endian length.
pub const HEADER_SIZE: usize = 5;

/// Largest payload a frame can declare (the length field is a `u32`).
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// Separator between the fields of a single bet record.
pub const FIELD_SEPARATOR: char = ',';

/// Separator between bet records inside a BATCH payload.
pub const RECORD_SEPARATOR: char = ';';

/// Separator between identifiers inside a WINNERS payload.
pub const WINNER_SEPARATOR: char = ',';

/// Number of fields in an encoded bet record, agency included.
pub const BET_FIELD_COUNT: usize = 6;
