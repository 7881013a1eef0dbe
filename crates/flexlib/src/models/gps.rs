use flexlib_core::Barrier;

use super::{StaticModel, store, unknown_token};
use crate::events::ObjectKind;
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum GpsToken {
        Altitude => "altitude",
        FrequencyError => "freq_error",
        Grid => "grid",
        Latitude => "lat",
        Longitude => "lon",
        Speed => "speed",
        Status => "status",
        Time => "time",
        Track => "track",
        Tracked => "tracked",
        Visible => "visible",
        Installed => "installed",
        GnssPoweredAntenna => "gnss_powered_ant",
    }
}

/// GPSDO readings. Status lines for this object are `#`-delimited and
/// values may contain spaces (`status=Not Present`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsState {
    pub altitude: String,
    pub frequency_error: f64,
    pub grid: String,
    pub latitude: String,
    pub longitude: String,
    pub speed: String,
    pub status: String,
    pub time: String,
    pub track: f64,
    pub tracked: bool,
    pub visible: bool,
    pub installed: bool,
    pub gnss_powered_antenna: bool,
}

#[derive(Debug, Default)]
pub struct Gps {
    state: Barrier<GpsState>,
}

impl Gps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GpsState {
        self.state.get()
    }
}

impl StaticModel for Gps {
    const KIND: ObjectKind = ObjectKind::Gps;

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match GpsToken::parse(&kv.key) {
                GpsToken::Altitude => store(st, k, kv, |s| &mut s.altitude),
                GpsToken::FrequencyError => store(st, k, kv, |s| &mut s.frequency_error),
                GpsToken::Grid => store(st, k, kv, |s| &mut s.grid),
                GpsToken::Latitude => store(st, k, kv, |s| &mut s.latitude),
                GpsToken::Longitude => store(st, k, kv, |s| &mut s.longitude),
                GpsToken::Speed => store(st, k, kv, |s| &mut s.speed),
                GpsToken::Status => store(st, k, kv, |s| &mut s.status),
                GpsToken::Time => store(st, k, kv, |s| &mut s.time),
                GpsToken::Track => store(st, k, kv, |s| &mut s.track),
                GpsToken::Tracked => store(st, k, kv, |s| &mut s.tracked),
                GpsToken::Visible => store(st, k, kv, |s| &mut s.visible),
                GpsToken::Installed => store(st, k, kv, |s| &mut s.installed),
                GpsToken::GnssPoweredAntenna => store(st, k, kv, |s| &mut s.gnss_powered_antenna),
                GpsToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyvalue::parse_key_values;

    #[test]
    fn hash_delimited_status() {
        let gps = Gps::new();
        gps.parse_properties(&parse_key_values(
            "lat=38.123#lon=-77.456#grid=FM18lp#altitude=120 m#tracked=1#visible=1#status=Fine Lock#freq_error=0.12",
            '#',
            true,
            false,
        ));
        let s = gps.state();
        assert_eq!(s.grid, "FM18lp");
        assert_eq!(s.altitude, "120 m");
        assert_eq!(s.status, "Fine Lock");
        assert!(s.tracked);
        assert_eq!(s.frequency_error, 0.12);
    }
}
