//! Core domain types and wire constants

/// Size of every device-side byte buffer (command, response, in, out).
pub const BUF_SIZE: usize = 512;

/// EXI device identification word, returned by a read of the id register.
pub const EXI_DEVICE_ID: u32 = 0x0202_0000;

/// Interrupt cause/mask bits.
///
/// Only `LINE_STATE` and `RECV_THRESH` are ever raised. The other two
/// are documented on real hardware but reserved here.
pub mod interrupt {
    /// Call progress changed (connect established or dropped)
    pub const LINE_STATE: u8 = 0x02;
    /// Send threshold reached (reserved, never raised)
    pub const SEND_THRESH: u8 = 0x10;
    /// Receive buffer has data above threshold
    pub const RECV_THRESH: u8 = 0x20;
    /// Receive buffer overflow (reserved, never raised)
    pub const RECV_OVERFLOW: u8 = 0x40;
}

/// Banner pushed to the response buffer once a dialed connection is up.
pub const CONNECT_BANNER: &str =
    "\r\nCARRIER 33600\r\nPROTOCOL: LAPM\r\nCOMPRESSION: NONE\r\nCONNECT 33600\r\n";

/// Reply pushed when a dial fails to resolve or connect.
pub const NO_CARRIER: &str = "\r\nNO CARRIER\r\n";
