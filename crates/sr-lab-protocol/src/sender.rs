//! Selective Repeat sending entity (A).
//!
//! The sender keeps up to `W` packets in flight, each acknowledged
//! individually. A single timer always belongs to the packet at
//! `send_base`; when it fires only that packet is retransmitted.
//!
//! ```text
//!   send_base            next_seq
//!       │                    │
//!  ─────┼────────────────────┼──────────────▶ seq space (mod S)
//!       │ <── in flight ───▶ │ <── usable ──▶
//!       │ <──────────── W slots ──────────▶ │
//! ```

use sr_lab_abstract::{
    ConfigError, Counters, Message, Packet, ProtocolConfig, ProtocolError, SystemContext,
    TransportProtocol,
};
use tracing::{debug, warn};

use crate::checksum::{is_corrupted, seal};
use crate::seq;
use crate::window::{Slot, SlotRing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Accepting,
    Full,
}

#[derive(Debug, Clone)]
pub struct SrSender {
    config: ProtocolConfig,
    send_base: u32,
    next_seq: u32,
    outstanding: usize,
    window: SlotRing,
    timer_running: bool,
    counters: Counters,
}

impl Default for SrSender {
    fn default() -> Self {
        Self::with_valid_config(ProtocolConfig::default())
    }
}

impl SrSender {
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: ProtocolConfig) -> Self {
        Self {
            config,
            send_base: 0,
            next_seq: 0,
            outstanding: 0,
            window: SlotRing::new(config.window_size),
            timer_running: false,
            counters: Counters::default(),
        }
    }

    /// Return to the initial state: empty window, both edges at zero, counters cleared.
    ///
    /// Local state only; a timer still armed in the environment is left alone.
    /// `init` cancels it before resetting.
    pub fn reset(&mut self) {
        self.send_base = 0;
        self.next_seq = 0;
        self.outstanding = 0;
        self.window.clear();
        self.timer_running = false;
        self.counters = Counters::default();
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn send_base(&self) -> u32 {
        self.send_base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Packets sent but not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn timer_running(&self) -> bool {
        self.timer_running
    }

    pub fn slot(&self, seq: u32) -> &Slot {
        self.window.get(seq)
    }

    /// Sequence numbers consumed between `send_base` and `next_seq`, acknowledged or not.
    fn span(&self) -> usize {
        seq::distance(self.send_base, self.next_seq, self.config.seq_space) as usize
    }

    pub fn state(&self) -> SenderState {
        // The span, not just the unacknowledged count, bounds new sequence
        // numbers: an acknowledged slot above a gap is still occupied.
        if self.span() < self.config.window_size {
            SenderState::Accepting
        } else {
            SenderState::Full
        }
    }

    pub fn submit(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: &Message,
    ) -> Result<(), ProtocolError> {
        if self.state() == SenderState::Full {
            self.counters.window_full += 1;
            ctx.log("SR send window is full, message rejected");
            return Err(ProtocolError::WindowFull {
                outstanding: self.outstanding,
            });
        }

        let seq = self.next_seq;
        let packet = seal(Packet::new_data(seq, *message));
        self.window.set(seq, Slot::Buffered(packet));
        self.outstanding += 1;

        ctx.log(&format!("SR send seq={seq}"));
        self.transmit(ctx, packet);

        if seq == self.send_base {
            self.start_timer(ctx);
        }
        self.next_seq = seq::next(seq, self.config.seq_space);
        ctx.record_metric("outstanding", self.outstanding as f64);
        Ok(())
    }

    pub fn on_ack(&mut self, ctx: &mut dyn SystemContext, packet: &Packet) {
        if is_corrupted(packet) {
            self.counters.corrupted_dropped += 1;
            ctx.log("SR corrupted ACK received, ignored");
            return;
        }
        self.counters.total_acks_received += 1;

        let ack = packet.header.ack_num;
        if !seq::in_window(
            ack,
            self.send_base,
            self.config.window(),
            self.config.seq_space,
        ) {
            ctx.log(&format!("SR duplicate ACK {ack} outside window, ignored"));
            return;
        }

        match self.window.get(ack) {
            Slot::Buffered(_) => {}
            Slot::Acknowledged => {
                ctx.log(&format!("SR duplicate ACK {ack}, ignored"));
                return;
            }
            Slot::Empty => {
                // In window but never sent: a stale ACK from an earlier lap.
                ctx.log(&format!("SR ACK {ack} for unsent slot, ignored"));
                return;
            }
        }

        ctx.log(&format!("SR new ACK {ack}"));
        self.counters.new_acks += 1;
        self.stop_timer(ctx);
        self.window.set(ack, Slot::Acknowledged);
        self.outstanding -= 1;

        while *self.window.get(self.send_base) == Slot::Acknowledged {
            self.window.take(self.send_base);
            self.send_base = seq::next(self.send_base, self.config.seq_space);
        }
        debug!(send_base = self.send_base, outstanding = self.outstanding, "window slid");

        if self.send_base != self.next_seq {
            self.start_timer(ctx);
        }
        ctx.record_metric("send_base", self.send_base as f64);
        ctx.record_metric("outstanding", self.outstanding as f64);
    }

    /// Retransmit the packet at `send_base`, and only that packet.
    pub fn on_timeout(&mut self, ctx: &mut dyn SystemContext) {
        self.timer_running = false;

        let packet = match self.window.get(self.send_base) {
            Slot::Buffered(packet) => *packet,
            other => {
                warn!(send_base = self.send_base, slot = ?other, "timeout with no packet at send_base");
                return;
            }
        };

        ctx.log(&format!(
            "SR timeout, resending seq={}",
            packet.header.seq_num
        ));
        self.transmit(ctx, packet);
        self.counters.packets_resent += 1;

        if self.send_base != self.next_seq {
            self.start_timer(ctx);
        }
    }

    fn transmit(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        ctx.send_packet(packet);
        self.counters.packets_sent += 1;
    }

    fn start_timer(&mut self, ctx: &mut dyn SystemContext) {
        if self.timer_running {
            warn!("sender timer already running");
            return;
        }
        ctx.start_timer(self.config.rtt);
        self.timer_running = true;
    }

    fn stop_timer(&mut self, ctx: &mut dyn SystemContext) {
        if !self.timer_running {
            warn!("sender timer stopped while idle");
            return;
        }
        ctx.stop_timer();
        self.timer_running = false;
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        if self.timer_running {
            self.stop_timer(ctx);
        }
        self.reset();
        ctx.log(&format!(
            "SR sender ready (W={}, S={}, RTT={})",
            self.config.window_size, self.config.seq_space, self.config.rtt
        ));
    }

    fn on_packet(
        &mut self,
        ctx: &mut dyn SystemContext,
        packet: Packet,
    ) -> Result<(), ProtocolError> {
        self.on_ack(ctx, &packet);
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        self.on_timeout(ctx);
    }

    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: &Message,
    ) -> Result<(), ProtocolError> {
        self.submit(ctx, message)
    }

    fn counters(&self) -> Counters {
        self.counters
    }
}
