//! Selective Repeat receiving entity (B).

use sr_lab_abstract::{
    ConfigError, Counters, Packet, ProtocolConfig, ProtocolError, SystemContext,
    TransportProtocol,
};
use tracing::warn;

use crate::checksum::{is_corrupted, seal};
use crate::seq;
use crate::window::{Slot, SlotRing};

#[derive(Debug, Clone)]
pub struct SrReceiver {
    config: ProtocolConfig,
    expected_base: u32,
    window: SlotRing,
    /// Alternating sequence number stamped on outgoing ACKs
    ack_seq: u32,
    counters: Counters,
}

impl Default for SrReceiver {
    fn default() -> Self {
        Self::with_valid_config(ProtocolConfig::default())
    }
}

impl SrReceiver {
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: ProtocolConfig) -> Self {
        Self {
            config,
            expected_base: 0,
            window: SlotRing::new(config.window_size),
            ack_seq: 1,
            counters: Counters::default(),
        }
    }

    pub fn reset(&mut self) {
        self.expected_base = 0;
        self.window.clear();
        self.ack_seq = 1;
        self.counters = Counters::default();
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn expected_base(&self) -> u32 {
        self.expected_base
    }

    /// Received packets waiting for a gap below them to fill.
    pub fn buffered(&self) -> usize {
        self.window.occupied()
    }

    pub fn slot(&self, seq: u32) -> &Slot {
        self.window.get(seq)
    }

    pub fn receive(
        &mut self,
        ctx: &mut dyn SystemContext,
        packet: &Packet,
    ) -> Result<(), ProtocolError> {
        if is_corrupted(packet) {
            self.counters.corrupted_dropped += 1;
            ctx.log("SR corrupted packet received, dropped");
            return Ok(());
        }

        let seq = packet.header.seq_num;
        let (w, s) = (self.config.window(), self.config.seq_space);

        if seq::in_window(seq, self.expected_base, w, s) {
            if self.window.get(seq).is_empty() {
                ctx.log(&format!("SR received seq={seq}"));
                self.window.set(seq, Slot::Buffered(*packet));
            } else {
                ctx.log(&format!("SR seq={seq} already buffered"));
            }
            self.deliver_in_order(ctx);
            self.send_ack(ctx, seq);
            ctx.record_metric("expected_base", self.expected_base as f64);
            Ok(())
        } else if seq::in_previous_window(seq, self.expected_base, w, s) {
            ctx.log(&format!("SR duplicate seq={seq}, re-ACK"));
            self.send_ack(ctx, seq);
            Ok(())
        } else {
            warn!(seq, base = self.expected_base, "packet outside both windows");
            Err(ProtocolError::OutOfWindow {
                seq,
                base: self.expected_base,
            })
        }
    }

    fn deliver_in_order(&mut self, ctx: &mut dyn SystemContext) {
        while let Slot::Buffered(packet) = *self.window.get(self.expected_base) {
            ctx.deliver_data(&packet.payload);
            self.counters.delivered += 1;
            self.window.take(self.expected_base);
            self.expected_base = seq::next(self.expected_base, self.config.seq_space);
        }
    }

    fn send_ack(&mut self, ctx: &mut dyn SystemContext, ack: u32) {
        let packet = seal(Packet::new_ack(self.ack_seq, ack));
        self.ack_seq ^= 1;
        ctx.send_packet(packet);
        self.counters.acks_sent += 1;
        self.counters.packets_sent += 1;
    }
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.reset();
        ctx.log(&format!(
            "SR receiver ready (W={}, S={})",
            self.config.window_size, self.config.seq_space
        ));
    }

    fn on_packet(
        &mut self,
        ctx: &mut dyn SystemContext,
        packet: Packet,
    ) -> Result<(), ProtocolError> {
        self.receive(ctx, &packet)
    }

    fn counters(&self) -> Counters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingContext;
    use sr_lab_abstract::Message;

    fn data(seq: u32) -> Packet {
        seal(Packet::new_data(seq, Message::filled(b'a' + seq as u8)))
    }

    fn acked(ctx: &RecordingContext) -> Vec<u32> {
        ctx.sent.iter().map(|p| p.header.ack_num).collect()
    }

    #[test]
    fn out_of_order_arrivals_cascade() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::default();

        rx.receive(&mut ctx, &data(2)).unwrap();
        assert!(ctx.delivered.is_empty());
        assert_eq!(rx.buffered(), 1);
        assert_eq!(acked(&ctx), vec![2]);

        rx.receive(&mut ctx, &data(0)).unwrap();
        assert_eq!(ctx.delivered, vec![Message::filled(b'a')]);
        assert_eq!(rx.expected_base(), 1);
        assert_eq!(acked(&ctx), vec![2, 0]);

        rx.receive(&mut ctx, &data(1)).unwrap();
        assert_eq!(
            ctx.delivered,
            vec![
                Message::filled(b'a'),
                Message::filled(b'b'),
                Message::filled(b'c')
            ]
        );
        assert_eq!(rx.expected_base(), 3);
        assert_eq!(rx.buffered(), 0);
        assert_eq!(acked(&ctx), vec![2, 0, 1]);
        assert_eq!(rx.counters().delivered, 3);
    }

    #[test]
    fn acks_are_well_formed_and_alternate() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::default();
        rx.receive(&mut ctx, &data(0)).unwrap();
        rx.receive(&mut ctx, &data(1)).unwrap();
        rx.receive(&mut ctx, &data(2)).unwrap();

        let seqs: Vec<u32> = ctx.sent.iter().map(|p| p.header.seq_num).collect();
        assert_eq!(seqs, vec![1, 0, 1]);
        for ack in &ctx.sent {
            assert!(!is_corrupted(ack));
            assert_eq!(ack.payload, Message::default());
        }
    }

    #[test]
    fn buffered_duplicate_is_not_stored_twice() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::default();
        rx.receive(&mut ctx, &data(3)).unwrap();
        rx.receive(&mut ctx, &data(3)).unwrap();
        assert_eq!(rx.buffered(), 1);
        assert_eq!(acked(&ctx), vec![3, 3]);
        assert!(ctx.delivered.is_empty());
    }

    #[test]
    fn delivered_duplicate_is_reacknowledged_only() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::default();
        rx.receive(&mut ctx, &data(0)).unwrap();
        rx.receive(&mut ctx, &data(0)).unwrap();

        assert_eq!(ctx.delivered.len(), 1);
        assert_eq!(rx.expected_base(), 1);
        assert_eq!(acked(&ctx), vec![0, 0]);
        assert_eq!(rx.counters().delivered, 1);
    }

    #[test]
    fn corrupted_packet_is_dropped_silently() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::default();
        let mut pkt = data(0);
        pkt.payload.data[7] = b'z';
        rx.receive(&mut ctx, &pkt).unwrap();

        assert!(ctx.sent.is_empty());
        assert!(ctx.delivered.is_empty());
        assert_eq!(rx.expected_base(), 0);
        assert_eq!(rx.counters().corrupted_dropped, 1);
    }

    #[test]
    fn window_edge_with_minimal_sequence_space() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::default();
        for seq in 0..6 {
            rx.receive(&mut ctx, &data(seq)).unwrap();
        }
        assert_eq!(rx.expected_base(), 6);
        ctx.sent.clear();

        // 11 is the far edge of the new window [6, 11]: accepted, buffered.
        rx.receive(&mut ctx, &data(11)).unwrap();
        assert_eq!(rx.buffered(), 1);
        // 0 is the oldest number of the duplicate window [0, 5]: re-ACKed.
        rx.receive(&mut ctx, &data(0)).unwrap();
        assert_eq!(rx.buffered(), 1);
        assert_eq!(acked(&ctx), vec![11, 0]);
        assert_eq!(ctx.delivered.len(), 6);
    }

    #[test]
    fn delivery_wraps_sequence_space() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::default();
        for seq in (0..12).chain(0..3) {
            rx.receive(&mut ctx, &data(seq)).unwrap();
        }
        assert_eq!(rx.expected_base(), 3);
        assert_eq!(ctx.delivered.len(), 15);
        assert_eq!(ctx.delivered[12], Message::filled(b'a'));
    }

    #[test]
    fn gap_across_sequence_wrap_cascades_through_zero() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::default();
        for seq in 0..9 {
            rx.receive(&mut ctx, &data(seq)).unwrap();
        }
        assert_eq!(rx.expected_base(), 9);
        ctx.delivered.clear();

        // Window [9, 2]: everything above the missing 9 waits.
        for seq in [0, 10, 2] {
            rx.receive(&mut ctx, &data(seq)).unwrap();
            assert_eq!(rx.expected_base(), 9);
        }
        assert_eq!(rx.buffered(), 3);
        assert!(ctx.delivered.is_empty());

        rx.receive(&mut ctx, &data(9)).unwrap();
        assert_eq!(rx.expected_base(), 11);
        rx.receive(&mut ctx, &data(11)).unwrap();
        assert_eq!(rx.expected_base(), 1);
        assert_eq!(
            ctx.delivered,
            vec![
                Message::filled(b'j'),
                Message::filled(b'k'),
                Message::filled(b'l'),
                Message::filled(b'a'),
            ]
        );
        assert_eq!(rx.buffered(), 1);

        rx.receive(&mut ctx, &data(1)).unwrap();
        assert_eq!(rx.expected_base(), 3);
        assert_eq!(rx.buffered(), 0);
    }

    #[test]
    fn maximal_sequence_space_does_not_overflow() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::new(ProtocolConfig {
            window_size: 3,
            seq_space: u32::MAX,
            rtt: 16,
        })
        .unwrap();
        let packet = |seq| seal(Packet::new_data(seq, Message::filled(b'x')));

        for seq in 0..3 {
            rx.receive(&mut ctx, &packet(seq)).unwrap();
        }
        assert_eq!(rx.expected_base(), 3);

        rx.receive(&mut ctx, &packet(0)).unwrap();
        assert_eq!(acked(&ctx), vec![0, 1, 2, 0]);
        assert_eq!(ctx.delivered.len(), 3);
        assert!(matches!(
            rx.receive(&mut ctx, &packet(u32::MAX - 1)),
            Err(ProtocolError::OutOfWindow { .. })
        ));
    }

    #[test]
    fn sequence_outside_both_windows_is_surfaced() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::new(ProtocolConfig {
            window_size: 4,
            seq_space: 16,
            rtt: 16,
        })
        .unwrap();

        let err = rx.receive(&mut ctx, &data(8)).unwrap_err();
        assert_eq!(err, ProtocolError::OutOfWindow { seq: 8, base: 0 });
        assert!(ctx.sent.is_empty());
        assert_eq!(rx.buffered(), 0);

        // 12..15 form the duplicate window below base 0.
        rx.receive(&mut ctx, &data(12)).unwrap();
        assert_eq!(acked(&ctx), vec![12]);
    }

    #[test]
    fn application_data_is_refused() {
        let mut ctx = RecordingContext::default();
        let mut rx = SrReceiver::default();
        assert_eq!(
            rx.on_app_data(&mut ctx, &Message::default()),
            Err(ProtocolError::Unsupported("application data"))
        );
    }
}
