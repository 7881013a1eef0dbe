//! Routing of decoded VITA-49 packets to the objects that own them.
//!
//! The UDP reader decodes each datagram with [`crate::vita::decode`] and
//! hands the packet to [`StreamDemux::route`]. Meter packets are unpacked
//! into one reading per meter id; every other stream is matched to a live
//! object by its stream id. A packet whose object does not exist (not yet
//! created, or just removed) is dropped without complaint.

use std::collections::HashSet;

use flexlib_core::Barrier;

use crate::events::RadioEvent;
use crate::models::{DynamicModel, Registry, StreamModel};
use crate::radio::Radio;
use crate::vita::{ClassCode, VitaPacket, parse_meter_payload};

/// What happened to one routed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Meter readings applied to this many known meters.
    Meters(usize),
    /// Forwarded to a stream object.
    Delivered,
    /// No live object owns the stream id.
    NoOwner,
    /// Class code missing, unsupported or payload unusable.
    Dropped,
}

/// Stream demultiplexer for one session.
#[derive(Debug, Default)]
pub struct StreamDemux {
    /// Meter stream ids that have delivered at least one packet.
    meter_streams: Barrier<HashSet<u32>>,
}

impl StreamDemux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one packet to its owner in `radio`.
    pub fn route(&self, packet: &VitaPacket, radio: &Radio) -> RouteOutcome {
        let stream_id = packet.stream_id.unwrap_or_default();
        let Some(class_code) = packet.class_code() else {
            tracing::error!(
                stream_id = format!("0x{stream_id:08X}"),
                "packet without class id"
            );
            return RouteOutcome::Dropped;
        };

        match class_code {
            ClassCode::Meter => self.route_meters(packet, stream_id, radio),
            ClassCode::Panadapter => forward(radio.panadapters(), packet, stream_id, radio),
            ClassCode::Waterfall => forward(radio.waterfalls(), packet, stream_id, radio),
            ClassCode::Opus => forward(radio.opus_streams(), packet, stream_id, radio),
            ClassCode::DaxAudio | ClassCode::DaxReducedBw => {
                if radio.mic_audio_streams().contains(&stream_id) {
                    forward(radio.mic_audio_streams(), packet, stream_id, radio)
                } else {
                    forward(radio.audio_streams(), packet, stream_id, radio)
                }
            }
            ClassCode::DaxIq24 | ClassCode::DaxIq48 | ClassCode::DaxIq96 | ClassCode::DaxIq192 => {
                forward(radio.iq_streams(), packet, stream_id, radio)
            }
            ClassCode::Discovery => {
                tracing::error!(
                    class_code = format!("0x{:04X}", class_code.raw()),
                    stream_id = format!("0x{stream_id:08X}"),
                    "unexpected discovery packet on stream port"
                );
                RouteOutcome::Dropped
            }
        }
    }

    /// Forget which meter streams have started, e.g. after a reconnect.
    pub fn reset(&self) {
        self.meter_streams.write().clear();
    }

    fn route_meters(&self, packet: &VitaPacket, stream_id: u32, radio: &Radio) -> RouteOutcome {
        let readings = match parse_meter_payload(&packet.payload) {
            Ok(readings) => readings,
            Err(e) => {
                tracing::warn!(error = %e, "dropping meter packet");
                return RouteOutcome::Dropped;
            }
        };

        if self.meter_streams.write().insert(stream_id) {
            tracing::info!(
                stream_id = format!("0x{stream_id:08X}"),
                "meter stream started"
            );
        }

        let mut applied = 0;
        for reading in readings {
            match radio.meters().get(&reading.meter_id) {
                Some(meter) => {
                    meter.set_raw_value(reading.value);
                    applied += 1;
                }
                None => tracing::trace!(meter_id = reading.meter_id, "reading for unknown meter"),
            }
        }
        RouteOutcome::Meters(applied)
    }
}

fn forward<M>(registry: &Registry<M>, packet: &VitaPacket, stream_id: u32, radio: &Radio) -> RouteOutcome
where
    M: StreamModel + DynamicModel<Id = u32>,
{
    let Some(object) = registry.get(&stream_id) else {
        tracing::trace!(
            object = M::KIND.as_str(),
            stream_id = format!("0x{stream_id:08X}"),
            "no object for stream"
        );
        return RouteOutcome::NoOwner;
    };

    if object.stream_status().record(packet.sequence) {
        tracing::info!(
            object = M::KIND.as_str(),
            stream_id = format!("0x{stream_id:08X}"),
            "stream started"
        );
        radio.emit(RadioEvent::StreamStarted {
            kind: M::KIND,
            stream_id,
        });
    }
    object.process_packet(packet);
    RouteOutcome::Delivered
}
