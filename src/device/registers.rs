//! Register map
//!
//! The low 5 bits of a command byte select one of these. Indexes
//! 20..=31 exist on the bus but are not mapped; they read as zero and
//! ignore writes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModemRegister {
    ExiId,
    InterruptMask,
    InterruptCause,
    AtData,
    PendingAtCmd,
    PendingAtRes,
    Unknown1,
    Unknown2,
    Data,
    SendPendingH,
    SendPendingL,
    RecvPendingH,
    RecvPendingL,
    Esr,
    SendThreshH,
    SendThreshL,
    RecvThreshH,
    RecvThreshL,
    RawStatus,
    Fwt,
    Reserved(u8),
}

impl ModemRegister {
    /// Decode from a command byte (only the low 5 bits matter).
    pub fn from_command_byte(cb: u8) -> Self {
        use ModemRegister::*;
        match cb & 0x1f {
            0 => ExiId,
            1 => InterruptMask,
            2 => InterruptCause,
            3 => AtData,
            4 => PendingAtCmd,
            5 => PendingAtRes,
            6 => Unknown1,
            7 => Unknown2,
            8 => Data,
            9 => SendPendingH,
            10 => SendPendingL,
            11 => RecvPendingH,
            12 => RecvPendingL,
            13 => Esr,
            14 => SendThreshH,
            15 => SendThreshL,
            16 => RecvThreshH,
            17 => RecvThreshL,
            18 => RawStatus,
            19 => Fwt,
            n => Reserved(n),
        }
    }

    /// Name for log lines.
    pub fn name(&self) -> &'static str {
        use ModemRegister::*;
        match self {
            ExiId => "EXI_ID",
            InterruptMask => "INTERRUPT_MASK",
            InterruptCause => "INTERRUPT_CAUSE",
            AtData => "AT_DATA",
            PendingAtCmd => "PENDING_AT_CMD",
            PendingAtRes => "PENDING_AT_RES",
            Unknown1 => "UNKNOWN1",
            Unknown2 => "UNKNOWN2",
            Data => "DATA",
            SendPendingH => "SEND_PENDING_H",
            SendPendingL => "SEND_PENDING_L",
            RecvPendingH => "RECV_PENDING_H",
            RecvPendingL => "RECV_PENDING_L",
            Esr => "ESR",
            SendThreshH => "SEND_THRESH_H",
            SendThreshL => "SEND_THRESH_L",
            RecvThreshH => "RECV_THRESH_H",
            RecvThreshL => "RECV_THRESH_L",
            RawStatus => "RAW_STATUS",
            Fwt => "FWT",
            Reserved(_) => "RESERVED",
        }
    }
}

impl Default for ModemRegister {
    fn default() -> Self {
        ModemRegister::ExiId
    }
}
