pub const REGION_BYTES: usize = 1024;             // Size of the shared block handed to every context
pub const WORD_BYTES: usize = 4;                  // Every cell is one aligned u32
pub const REGION_WORDS: usize = REGION_BYTES / WORD_BYTES;

pub const LOCK_CELL_OFFSET: usize = 0;            // Byte offset of the lock word
pub const PHASE_CELL_OFFSET: usize = 4;           // Byte offset of the phase word

pub const FAIL_WAIT_MS: f64 = 100.0;              // Budget that must time out while the lock stays held
pub const ACQUIRE_WAIT_MS: f64 = 1000.0;          // Budget inside which the control context releases

pub const CONTROL_TICK_MS: u64 = 10;              // Control loop period
pub const RENDER_QUANTUM_FRAMES: u64 = 128;       // Frames rendered per callback
pub const SAMPLE_RATE: u64 = 48_000;

/*
 * A full run spends FAIL_WAIT_MS spinning plus a few control ticks, so
 * anything past this is a stuck protocol rather than a slow machine.
 */
pub const SCENARIO_TIMEOUT_MS: u64 = 10_000;
