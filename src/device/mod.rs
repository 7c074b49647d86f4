//! The modem adapter device
//!
//! Owns every piece of guest-visible state and implements the three
//! faces of the device:
//! - the EXI bus front-end (imm/DMA transfers decoded into register
//!   traffic)
//! - the AT ingress state machine and the `AtHandler` callbacks
//! - the modem core: dial, connect, transmit, receive poll, hangup
//!
//! Everything runs on the host emulator thread. Scheduler callbacks
//! arrive through `dispatch_event`, driven by the host when an event
//! registered at construction comes due.

pub mod buffers;
pub mod registers;

use std::io::{Read, Write};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::at::{self, AtHandler, CommandError};
use crate::domain::{
    interrupt, ModemConfig, ModemError, ModemResult, CONNECT_BANNER, EXI_DEVICE_ID, NO_CARRIER,
};
use crate::ports::{
    Dialer, EventId, GuestMemory, InterruptLine, LineTransport, NumberResolver, RecvOutcome,
    Scheduler,
};
use buffers::{DrainWindow, LineAccumulator, StagingBuffer};
use registers::ModemRegister;

/// Bus front-end state: interrupt bytes and the decoded transaction.
#[derive(Clone, Default, Serialize, Deserialize)]
struct ExiState {
    interrupt_mask: u8,
    interrupt: u8,
    current_register: ModemRegister,
    pending_write_bytes: u16,
}

/// AT channel state: the line under construction, the response
/// window, and the ingress mode bits.
#[derive(Clone, Serialize, Deserialize)]
struct AtState {
    cmd: LineAccumulator,
    res: DrainWindow,
    /// Whether AT input is echoed; controlled via ATE.
    /// Recommended default per V.250 6.2.4 is on.
    echo: bool,
    received_a: bool,
    in_command: bool,
}

impl Default for AtState {
    fn default() -> Self {
        Self {
            cmd: LineAccumulator::default(),
            res: DrainWindow::default(),
            echo: true,
            received_a: false,
            in_command: false,
        }
    }
}

/// Online-data state: bytes staged for the socket and bytes received
/// from it.
#[derive(Clone, Default, Serialize, Deserialize)]
struct DataState {
    out: StagingBuffer,
    incoming: DrainWindow,
}

/// Call state.
#[derive(Clone, Default, Serialize, Deserialize)]
struct ModemState {
    cancel_connect: bool,
    pending_number: String,
    /// Previous command line, to support A/
    prev_cmd_line: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct DeviceSnapshot {
    exi: ExiState,
    at: AtState,
    data: DataState,
    modem: ModemState,
}

/// The emulated modem adapter.
pub struct ModemAdapter {
    config: ModemConfig,
    exi: ExiState,
    at: AtState,
    data: DataState,
    modem: ModemState,
    transport: Option<Box<dyn LineTransport>>,

    scheduler: Box<dyn Scheduler>,
    dialer: Box<dyn Dialer>,
    resolver: Box<dyn NumberResolver>,
    irq_line: Box<dyn InterruptLine>,

    connect_event: EventId,
    recv_event: EventId,
}

impl ModemAdapter {
    pub fn new(
        config: ModemConfig,
        mut scheduler: Box<dyn Scheduler>,
        dialer: Box<dyn Dialer>,
        resolver: Box<dyn NumberResolver>,
        irq_line: Box<dyn InterruptLine>,
    ) -> Self {
        let connect_event = scheduler.register_event("ModemConnect");
        let recv_event = scheduler.register_event("ModemRecv");
        Self {
            config,
            exi: ExiState::default(),
            at: AtState::default(),
            data: DataState::default(),
            modem: ModemState::default(),
            transport: None,
            scheduler,
            dialer,
            resolver,
            irq_line,
            connect_event,
            recv_event,
        }
    }

    // -----------------------------------------------------------------
    // Bus surface
    // -----------------------------------------------------------------

    pub fn set_cs(&mut self, cs: i32) {
        debug!("set CS: {cs:08x}");
    }

    pub fn is_present(&self) -> bool {
        true
    }

    pub fn is_interrupt_asserted(&self) -> bool {
        self.exi.interrupt & self.exi.interrupt_mask != 0
    }

    /// Immediate write: either a command byte (transaction setup, soft
    /// reset) or payload for the register selected by the previous
    /// command byte.
    pub fn imm_write(&mut self, word: u32, size: usize) {
        let size = size.clamp(1, 4);

        if self.exi.pending_write_bytes > 0 {
            self.write_payload(word, size);
            return;
        }

        if word & 0x8000_0000 != 0 {
            info!("imm write with bit 31 set, resetting modem");
            self.soft_reset();
            return;
        }

        let cmd_byte = (word >> 24) as u8;
        self.exi.current_register = ModemRegister::from_command_byte(cmd_byte);

        if cmd_byte & 0x60 == 0x60 {
            // Write with length: the middle two bytes carry a
            // big-endian byte count
            let count = ((word >> 8) & 0xffff) as u16;
            debug!(
                "start data write for register {} size {count}",
                self.exi.current_register.name()
            );
            self.exi.pending_write_bytes = count;
        } else if cmd_byte & 0x40 != 0 {
            debug!(
                "start single write for register {}",
                self.exi.current_register.name()
            );
            self.exi.pending_write_bytes = 1;
        }
        // Plain read setup otherwise: selecting the register is all
    }

    fn write_payload(&mut self, word: u32, size: usize) {
        let k = usize::from(self.exi.pending_write_bytes).min(size);

        match self.exi.current_register {
            ModemRegister::Data => {
                for i in 0..k {
                    let b = (word >> (8 * (3 - i))) as u8;
                    self.data.out.push_slice(&[b]);
                }
            }
            ModemRegister::AtData => {
                for i in 0..k {
                    let b = (word >> (8 * (3 - i))) as u8;
                    self.feed_at_byte(b);
                }
            }
            reg => {
                if k > 1 {
                    error!(
                        "multi-byte payload for single-byte register {}, dropped",
                        reg.name()
                    );
                } else {
                    self.store_register_byte(reg, (word >> 24) as u8);
                }
            }
        }

        self.exi.pending_write_bytes -= k as u16;

        if self.exi.pending_write_bytes == 0 && self.exi.current_register == ModemRegister::Data {
            self.transmit();
        }
    }

    fn store_register_byte(&mut self, reg: ModemRegister, b: u8) {
        debug!("write reg {} = {b:#04x}", reg.name());
        match reg {
            ModemRegister::ExiId => error!("register write to EXI ID"),
            ModemRegister::InterruptMask => {
                self.exi.interrupt_mask = b;
                self.exi.interrupt = 0;
                self.irq_line.update();
            }
            ModemRegister::InterruptCause => {
                self.exi.interrupt = b;
                self.irq_line.update();
            }
            ModemRegister::Fwt => {
                self.exi.interrupt = 0;
                self.irq_line.update();
            }
            other => debug!("unhandled register write to {}", other.name()),
        }
    }

    /// Immediate read of the selected register, left-justified.
    pub fn imm_read(&mut self, size: usize) -> u32 {
        let size = size.clamp(1, 4);
        debug!(
            "read reg {} size {size}",
            self.exi.current_register.name()
        );

        let result = match self.exi.current_register {
            ModemRegister::ExiId => EXI_DEVICE_ID,
            ModemRegister::InterruptMask => u32::from(self.exi.interrupt_mask),
            ModemRegister::InterruptCause => {
                // Destructive read
                let v = u32::from(self.exi.interrupt);
                self.exi.interrupt = 0;
                self.irq_line.update();
                v
            }
            ModemRegister::AtData => {
                let mut v = 0u32;
                for _ in 0..size {
                    v = (v << 8) | u32::from(self.at.res.pop());
                }
                v
            }
            ModemRegister::PendingAtCmd => u32::from(self.at.cmd.pending()),
            ModemRegister::PendingAtRes => u32::from(self.at.res.pending()),
            ModemRegister::Data => {
                let mut v = 0u32;
                for _ in 0..size {
                    v = (v << 8) | u32::from(self.data.incoming.pop());
                }
                v
            }
            ModemRegister::RecvPendingH => u32::from(self.data.incoming.pending() >> 8),
            ModemRegister::RecvPendingL => u32::from(self.data.incoming.pending() & 0xff),
            _ => 0,
        };

        result << (8 * (4 - size))
    }

    /// DMA write: bulk payload for the in-flight DATA transaction.
    pub fn dma_write(&mut self, mem: &mut dyn GuestMemory, addr: u32, len: u32) {
        debug!("DMA write: {addr:08x} len {len}");
        let mut chunk = vec![0u8; len as usize];
        mem.copy_from_guest(addr, &mut chunk);
        self.data.out.push_slice(&chunk);

        self.exi.pending_write_bytes =
            self.exi.pending_write_bytes.saturating_sub(len as u16);
        if self.exi.pending_write_bytes == 0 {
            self.transmit();
        }
    }

    /// DMA read: drain received bytes into guest memory.
    pub fn dma_read(&mut self, mem: &mut dyn GuestMemory, addr: u32, len: u32) {
        debug!("DMA read: {addr:08x} len {len}");
        let mut chunk = vec![0u8; len as usize];
        self.data.incoming.drain_into(&mut chunk);
        mem.copy_to_guest(addr, &chunk);
    }

    // -----------------------------------------------------------------
    // AT ingress
    // -----------------------------------------------------------------

    /// One byte arriving over AT_DATA.
    ///
    /// Idle until "AT" is seen; "A/" replays the previous line; in
    /// command mode bytes accumulate until CR hands the line to the
    /// parser. Echo covers every byte fed, CR included.
    fn feed_at_byte(&mut self, b: u8) {
        if self.at.echo {
            self.at.res.push_byte(b);
        }

        if !self.at.in_command {
            if self.at.received_a {
                self.at.received_a = false;
                match b {
                    b't' | b'T' => self.at.in_command = true,
                    b'/' => self.repeat_previous_line(),
                    b'a' | b'A' => self.at.received_a = true,
                    _ => {}
                }
            } else if b == b'a' || b == b'A' {
                self.at.received_a = true;
            }
            return;
        }

        if b != b'\r' {
            self.at.cmd.push(b);
            return;
        }

        // CR terminates the line
        if self.at.cmd.overflowed() {
            info!("overflowed AT command line discarded");
            self.push_response("ERROR");
        } else {
            let line = self.at.cmd.bytes().to_vec();
            let reply = at::handle_line(self, &line);
            if !reply.is_empty() {
                self.push_response(&reply);
            }
            self.modem.prev_cmd_line = line;
        }
        self.at.cmd.reset();
        self.at.in_command = false;
    }

    fn repeat_previous_line(&mut self) {
        let line = self.modem.prev_cmd_line.clone();
        let reply = at::handle_line(self, &line);
        if !reply.is_empty() {
            self.push_response(&reply);
        }
    }

    fn push_response(&mut self, reply: &str) {
        self.at.res.push_slice(reply.as_bytes());
    }

    // -----------------------------------------------------------------
    // Modem core
    // -----------------------------------------------------------------

    fn set_interrupt(&mut self, kind: u8) {
        self.exi.interrupt |= kind;
        self.irq_line.update();
    }

    /// Entry point for due scheduler events.
    pub fn dispatch_event(&mut self, id: EventId) {
        if id == self.connect_event {
            self.on_connect_event();
        } else if id == self.recv_event {
            self.on_recv_event();
        } else {
            debug!("ignoring unknown scheduler event {id:?}");
        }
    }

    fn on_connect_event(&mut self) {
        if self.modem.cancel_connect {
            debug!("connect aborted by hangup");
            return;
        }

        let number = self.modem.pending_number.clone();
        let addr = match self.resolver.resolve(&number) {
            Ok(addr) => addr,
            Err(e) => {
                info!("dial \"{number}\" did not resolve: {e}");
                self.report_no_carrier();
                return;
            }
        };

        match self.dialer.connect(addr) {
            Ok(transport) => {
                info!("carrier up: \"{number}\" -> {addr}");
                self.transport = Some(transport);
                self.push_response(CONNECT_BANNER);
                self.set_interrupt(interrupt::LINE_STATE);
                self.scheduler
                    .schedule(self.config.recv_interval_cycles, self.recv_event);
            }
            Err(e) => {
                info!("connect to {addr} failed: {e}");
                self.report_no_carrier();
            }
        }
    }

    fn report_no_carrier(&mut self) {
        self.push_response(NO_CARRIER);
        self.set_interrupt(interrupt::LINE_STATE);
    }

    /// Push the staged bytes to the socket in one non-blocking send.
    /// A short or refused send loses the remainder; the staging buffer
    /// is reset either way.
    fn transmit(&mut self) {
        if self.data.out.is_empty() {
            return;
        }
        let len = self.data.out.len();

        match self.transport.as_mut() {
            None => warn!("transmit of {len} bytes with no carrier, dropped"),
            Some(t) => match t.send(self.data.out.bytes()) {
                Ok(n) if n == len => debug!("transmitted {len} bytes"),
                Ok(n) => warn!("short send: {n}/{len} bytes, remainder dropped"),
                Err(e) => warn!("send failed: {e}, {len} bytes dropped"),
            },
        }

        self.data.out.clear();
    }

    fn on_recv_event(&mut self) {
        if self.data.incoming.free() == 0 {
            // No room; check again next interval
            self.scheduler
                .schedule(self.config.recv_interval_cycles, self.recv_event);
            return;
        }

        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        match transport.recv(self.data.incoming.tail_mut()) {
            RecvOutcome::Data(n) => {
                self.data.incoming.advance_end(n);
                debug!("received {n} bytes");
                if self.data.incoming.pending() > 0 {
                    self.set_interrupt(interrupt::RECV_THRESH);
                }
                self.scheduler
                    .schedule(self.config.recv_interval_cycles, self.recv_event);
            }
            RecvOutcome::NotReady => {
                self.scheduler
                    .schedule(self.config.recv_interval_cycles, self.recv_event);
            }
            RecvOutcome::Closed => {
                info!("peer closed the connection, receive poll stopped");
            }
        }
    }

    /// Tear down the call: drop the carrier, clear both data buffers,
    /// cancel pending polls and any in-flight connect. Interrupt cause
    /// and mask are deliberately left alone; the guest clears those
    /// through their registers.
    fn reset_comms(&mut self) {
        if self.transport.take().is_some() {
            info!("carrier dropped");
        }
        self.data.out.clear();
        self.data.incoming.reset();
        self.scheduler.remove_all(self.recv_event);
        self.modem.cancel_connect = true;
    }

    /// Bus-level reset token (command byte with bit 7 set).
    fn soft_reset(&mut self) {
        self.reset_comms();
        self.exi.current_register = ModemRegister::ExiId;
        self.exi.pending_write_bytes = 0;
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    /// Serialize the guest-visible state. The socket is not part of a
    /// snapshot; a restored device starts disconnected.
    pub fn save_state(&self, writer: impl Write) -> ModemResult<()> {
        let snapshot = DeviceSnapshot {
            exi: self.exi.clone(),
            at: self.at.clone(),
            data: self.data.clone(),
            modem: self.modem.clone(),
        };
        serde_json::to_writer(writer, &snapshot)
            .map_err(|e| ModemError::Snapshot(e.to_string()))
    }

    pub fn load_state(&mut self, reader: impl Read) -> ModemResult<()> {
        let snapshot: DeviceSnapshot = serde_json::from_reader(reader)
            .map_err(|e| ModemError::Snapshot(e.to_string()))?;
        self.exi = snapshot.exi;
        self.at = snapshot.at;
        self.data = snapshot.data;
        self.modem = snapshot.modem;
        self.transport = None;
        self.scheduler.remove_all(self.recv_event);
        Ok(())
    }
}

impl AtHandler for ModemAdapter {
    fn handle_command(&mut self, command: &str, arg: &str) -> Result<(), CommandError> {
        match command {
            "E" => {
                // Empty argument means "echo on" per V.250 6.2.4
                self.at.echo = arg.chars().next().map_or(true, |c| c != '0');
            }
            "H" if arg.is_empty() || arg == "0" => {
                self.reset_comms();
            }
            _ => debug!("basic command {command}{arg} accepted as no-op"),
        }
        Ok(())
    }

    fn handle_dial(&mut self, dial_string: &str) -> Result<(), CommandError> {
        // Leading tone/pulse indicator is meaningless here
        let number = dial_string
            .strip_prefix(&['T', 'P'][..])
            .unwrap_or(dial_string);

        info!("dialing \"{number}\"");
        self.modem.pending_number = number.to_string();
        self.modem.cancel_connect = false;
        self.scheduler
            .schedule(self.config.connect_delay_cycles, self.connect_event);
        Ok(())
    }

    fn handle_extended(&mut self, command: &str, args: &[String]) -> Result<(), CommandError> {
        debug!("extended command +{command} ({} args) accepted as no-op", args.len());
        Ok(())
    }

    fn query_extended(&mut self, command: &str) -> Result<(), CommandError> {
        debug!("extended query +{command}=? accepted as no-op");
        Ok(())
    }

    fn get_extended_parameter(&mut self, command: &str) -> Result<(), CommandError> {
        debug!("extended read +{command}? accepted as no-op");
        Ok(())
    }

    fn set_s_parameter(&mut self, index: u16, value: u16) -> Result<(), CommandError> {
        debug!("S{index}={value} accepted as no-op");
        Ok(())
    }

    fn get_s_parameter(&mut self, index: u16) -> Result<(), CommandError> {
        debug!("S{index}? accepted as no-op");
        Ok(())
    }

    fn reset_s_parameter(&mut self, index: u16) -> Result<(), CommandError> {
        debug!("S{index}= reset accepted as no-op");
        Ok(())
    }
}
