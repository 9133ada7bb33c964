use std::io::{Read, Write};
use std::time::Duration;

use crate::binary::{self, byte_enum};
use crate::header::HeaderError;

/// Number of playable empires with their own option entries.
pub const EMPIRE_OPTION_COUNT: usize = 7;

const MOD_ID_LEN: usize = 16;
const NANOS_PER_TICK: u64 = 100;

byte_enum! {
    pub enum AiMode default Normal {
        Normal = 0,
        Agreeable = 1,
        Aggressive = 2,
    }
}

byte_enum! {
    pub enum GalaxyShape default Spiral {
        Spiral = 0,
        Ring = 1,
        Elliptical = 2,
        Cluster = 3,
        Irregular = 4,
    }
}

byte_enum! {
    pub enum GalaxySize default Medium {
        Tiny = 0,
        Small = 1,
        Medium = 2,
        Large = 3,
        Huge = 4,
    }
}

byte_enum! {
    pub enum PlanetDensity default Medium {
        Sparse = 3,
        Medium = 5,
        Dense = 7,
    }
}

byte_enum! {
    pub enum StarDensity default Medium {
        Sparse = 1,
        Medium = 2,
        Dense = 3,
    }
}

byte_enum! {
    pub enum MinorRaceFrequency default Some {
        None = 0,
        Few = 1,
        Some = 2,
        Many = 3,
        Most = 4,
    }
}

byte_enum! {
    pub enum GalaxyCanon default Canon {
        Canon = 0,
        Random = 1,
    }
}

byte_enum! {
    pub enum StartingTechLevel default Early {
        Early = 0,
        Developed = 1,
        Sophisticated = 2,
        Advanced = 3,
        Supreme = 4,
    }
}

byte_enum! {
    pub enum ModifierBalancing default Run {
        Run = 0,
        Debug = 1,
    }
}

byte_enum! {
    pub enum GamePace default Normal {
        Slow = 0,
        Normal = 1,
        Fast = 2,
    }
}

byte_enum! {
    /// Turn timer presets; the concrete duration lives in [`GameOptions::turn_timer`].
    pub enum TurnTimerMode default Unlimited {
        Unlimited = 0,
        Sec25 = 1,
        Sec50 = 2,
        Sec75 = 3,
        Sec100 = 4,
        Sec150 = 5,
        Sec200 = 6,
        Sec250 = 7,
        Sec300 = 8,
        Sec360 = 9,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmpireSettings {
    pub playable: bool,
    /// Handicap below zero, bonus above. The lobby offers -5 to 5; any value
    /// is persisted as written.
    pub modifier: i32,
}

impl Default for EmpireSettings {
    fn default() -> Self {
        Self {
            playable: true,
            modifier: 0,
        }
    }
}

/// Options fixed at match creation and persisted at the head of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOptions {
    pub is_frozen: bool,
    pub mod_id: [u8; MOD_ID_LEN],
    pub ai_mode: AiMode,
    pub galaxy_shape: GalaxyShape,
    pub galaxy_size: GalaxySize,
    pub planet_density: PlanetDensity,
    pub star_density: StarDensity,
    pub minor_race_frequency: MinorRaceFrequency,
    pub galaxy_canon: GalaxyCanon,
    pub starting_tech_level: StartingTechLevel,
    /// Federation, Romulan, Klingon, Cardassian, Dominion, Borg, Terran Empire.
    pub empires: [EmpireSettings; EMPIRE_OPTION_COUNT],
    pub modifier_balancing: ModifierBalancing,
    pub game_pace: GamePace,
    pub turn_timer_mode: TurnTimerMode,
    pub ai_takeover: bool,
    /// In 100ns ticks.
    pub turn_timer: i64,
    /// In 100ns ticks.
    pub combat_timer: i64,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            is_frozen: false,
            mod_id: [0; MOD_ID_LEN],
            ai_mode: AiMode::default(),
            galaxy_shape: GalaxyShape::default(),
            galaxy_size: GalaxySize::default(),
            planet_density: PlanetDensity::default(),
            star_density: StarDensity::default(),
            minor_race_frequency: MinorRaceFrequency::default(),
            galaxy_canon: GalaxyCanon::default(),
            starting_tech_level: StartingTechLevel::default(),
            empires: [EmpireSettings::default(); EMPIRE_OPTION_COUNT],
            modifier_balancing: ModifierBalancing::default(),
            game_pace: GamePace::default(),
            turn_timer_mode: TurnTimerMode::default(),
            ai_takeover: true,
            turn_timer: 0,
            combat_timer: 0,
        }
    }
}

/// Whole ticks in `duration`, rounded down and saturating at `i64::MAX`.
pub fn duration_to_ticks(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos() / u128::from(NANOS_PER_TICK)).unwrap_or(i64::MAX)
}

/// Negative tick counts map to zero.
pub fn ticks_to_duration(ticks: i64) -> Duration {
    let ticks = u64::try_from(ticks).unwrap_or(0);
    Duration::from_nanos(ticks.saturating_mul(NANOS_PER_TICK))
}

fn read_enum<R: Read, E: TryFrom<u8, Error = u8>>(
    reader: &mut R,
    field: &'static str,
) -> Result<E, HeaderError> {
    let byte = binary::read_u8(reader)?;
    E::try_from(byte).map_err(|value| HeaderError::InvalidEnum {
        field,
        value: i32::from(value),
    })
}

impl GameOptions {
    /// Options become read-only once a match starts.
    pub fn freeze(&mut self) {
        self.is_frozen = true;
    }

    pub fn set_turn_timer(&mut self, duration: Duration) {
        self.turn_timer = duration_to_ticks(duration);
    }

    pub fn set_combat_timer(&mut self, duration: Duration) {
        self.combat_timer = duration_to_ticks(duration);
    }

    pub fn turn_timer_duration(&self) -> Duration {
        ticks_to_duration(self.turn_timer)
    }

    pub fn combat_timer_duration(&self) -> Duration {
        ticks_to_duration(self.combat_timer)
    }

    /// Copy that can be edited again, e.g. for a rematch lobby.
    pub fn unfrozen(&self) -> Self {
        Self {
            is_frozen: false,
            ..self.clone()
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), HeaderError> {
        binary::write_bool(writer, self.is_frozen)?;
        binary::write_i32(writer, MOD_ID_LEN as i32)?;
        writer.write_all(&self.mod_id)?;
        for byte in [
            u8::from(self.ai_mode),
            u8::from(self.galaxy_shape),
            u8::from(self.galaxy_size),
            u8::from(self.planet_density),
            u8::from(self.star_density),
            u8::from(self.minor_race_frequency),
            u8::from(self.galaxy_canon),
            u8::from(self.starting_tech_level),
        ] {
            binary::write_u8(writer, byte)?;
        }
        for empire in &self.empires {
            binary::write_bool(writer, empire.playable)?;
        }
        for empire in &self.empires {
            binary::write_i32(writer, empire.modifier)?;
        }
        binary::write_u8(writer, self.modifier_balancing.into())?;
        binary::write_u8(writer, self.game_pace.into())?;
        binary::write_u8(writer, self.turn_timer_mode.into())?;
        binary::write_bool(writer, self.ai_takeover)?;
        binary::write_i64(writer, self.turn_timer)?;
        binary::write_i64(writer, self.combat_timer)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, HeaderError> {
        let is_frozen = binary::read_bool(reader)?;
        let mod_id_len = binary::read_i32(reader)?;
        if mod_id_len != MOD_ID_LEN as i32 {
            return Err(HeaderError::InvalidEnum {
                field: "mod_id_len",
                value: mod_id_len,
            });
        }
        let mut mod_id = [0u8; MOD_ID_LEN];
        reader.read_exact(&mut mod_id)?;

        let ai_mode = read_enum(reader, "ai_mode")?;
        let galaxy_shape = read_enum(reader, "galaxy_shape")?;
        let galaxy_size = read_enum(reader, "galaxy_size")?;
        let planet_density = read_enum(reader, "planet_density")?;
        let star_density = read_enum(reader, "star_density")?;
        let minor_race_frequency = read_enum(reader, "minor_race_frequency")?;
        let galaxy_canon = read_enum(reader, "galaxy_canon")?;
        let starting_tech_level = read_enum(reader, "starting_tech_level")?;

        let mut empires = [EmpireSettings::default(); EMPIRE_OPTION_COUNT];
        for empire in empires.iter_mut() {
            empire.playable = binary::read_bool(reader)?;
        }
        for empire in empires.iter_mut() {
            empire.modifier = binary::read_i32(reader)?;
        }

        Ok(Self {
            is_frozen,
            mod_id,
            ai_mode,
            galaxy_shape,
            galaxy_size,
            planet_density,
            star_density,
            minor_race_frequency,
            galaxy_canon,
            starting_tech_level,
            empires,
            modifier_balancing: read_enum(reader, "modifier_balancing")?,
            game_pace: read_enum(reader, "game_pace")?,
            turn_timer_mode: read_enum(reader, "turn_timer_mode")?,
            ai_takeover: binary::read_bool(reader)?,
            turn_timer: binary::read_i64(reader)?,
            combat_timer: binary::read_i64(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn default_options_have_fixed_size() {
        let mut out = Vec::new();
        GameOptions::default().write_to(&mut out).unwrap();
        // flag, mod id, eight selectors, playable flags, modifiers,
        // three selectors, takeover, two timers
        let expected =
            1 + 4 + 16 + 8 + EMPIRE_OPTION_COUNT + 4 * EMPIRE_OPTION_COUNT + 3 + 1 + 16;
        assert_eq!(out.len(), expected);
    }

    #[test]
    fn customised_options_read_back() {
        let mut options = GameOptions {
            galaxy_shape: GalaxyShape::Ring,
            planet_density: PlanetDensity::Dense,
            turn_timer_mode: TurnTimerMode::Sec100,
            ai_takeover: false,
            ..GameOptions::default()
        };
        options.set_turn_timer(Duration::from_secs(100));
        options.set_combat_timer(Duration::from_millis(2_500));
        options.empires[2] = EmpireSettings {
            playable: false,
            modifier: -3,
        };
        options.mod_id[0] = 0xAB;
        options.freeze();

        let mut out = Vec::new();
        options.write_to(&mut out).unwrap();
        let back = GameOptions::read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!(back, options);
        assert_eq!(back.turn_timer_duration(), Duration::from_secs(100));
        assert!(!back.unfrozen().is_frozen);
    }

    #[test]
    fn out_of_range_modifiers_survive_a_round_trip() {
        let mut options = GameOptions::default();
        options.empires[0].modifier = 6;
        options.empires[6].modifier = i32::MIN;

        let mut out = Vec::new();
        options.write_to(&mut out).unwrap();
        let back = GameOptions::read_from(&mut Cursor::new(out)).unwrap();

        assert_eq!(back.empires[0].modifier, 6);
        assert_eq!(back.empires[6].modifier, i32::MIN);
    }

    #[test]
    fn timers_are_stored_as_written_ticks() {
        let mut options = GameOptions::default();
        options.set_turn_timer(Duration::from_nanos(150));
        assert_eq!(options.turn_timer, 1);
        options.combat_timer = -42;

        let mut out = Vec::new();
        options.write_to(&mut out).unwrap();
        let back = GameOptions::read_from(&mut Cursor::new(out)).unwrap();

        assert_eq!(back, options);
        assert_eq!(back.turn_timer_duration(), Duration::from_nanos(100));
        assert_eq!(back.combat_timer_duration(), Duration::ZERO);
    }

    #[test]
    fn unknown_selector_byte_is_rejected() {
        let mut out = Vec::new();
        GameOptions::default().write_to(&mut out).unwrap();
        // planet density sits after the flag, mod id and three selectors
        out[1 + 4 + 16 + 3] = 4;
        let err = GameOptions::read_from(&mut Cursor::new(out)).unwrap_err();
        assert!(matches!(
            err,
            HeaderError::InvalidEnum {
                field: "planet_density",
                value: 4
            }
        ));
    }
}
