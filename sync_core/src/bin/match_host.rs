use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use sync_core::config::SyncConfig;
use sync_core::{
    load_sync_config_from_env, with_context, CivDatabase, Civilization, CivilizationManager,
    Diplomat, GameOptions, HeaderError, Lobby, LobbyError, MapLocation, ObjectId, ObjectKind,
    Player, SessionHeader, SimulationContext, SnapshotError, TurnNumber, TurnSnapshot,
    UniverseObject,
};

const MATCH_COUNT: usize = 2;
const SYSTEMS_PER_MATCH: usize = 12;
const GALAXY_EDGE: i32 = 32;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config, config_path) = load_sync_config_from_env();
    let mut workers = Vec::with_capacity(MATCH_COUNT);
    for index in 0..MATCH_COUNT {
        match HostedMatch::new(index, Arc::clone(&config)) {
            Ok(hosted) => workers.push(spawn_match_worker(hosted)),
            Err(err) => warn!(
                target: "empire_sync::host",
                match_index = index,
                error = %err,
                "match.start_failed"
            ),
        }
    }

    info!(
        target: "empire_sync::host",
        matches = workers.len(),
        config = ?config_path,
        "match_host ready"
    );

    let command_rx = spawn_command_listener();
    while let Ok(command) = command_rx.recv() {
        match command {
            Command::Turn(turns) => broadcast(&workers, MatchCommand::Turn(turns)),
            Command::Sync => broadcast(&workers, MatchCommand::Sync),
            Command::Claim {
                match_index,
                civ,
                location,
                weight,
            } => send_to(
                &workers,
                match_index,
                MatchCommand::Claim {
                    civ,
                    location,
                    weight,
                },
            ),
            Command::Save { match_index, path } => {
                send_to(&workers, match_index, MatchCommand::Save(path))
            }
            Command::Load { path } => match restore_session(&path) {
                Ok((header, restored)) => info!(
                    target: "empire_sync::host",
                    path = %path.display(),
                    title = header.title(config.saves()),
                    context_id = restored.context_id(),
                    turn = %restored.turn_number(),
                    player = %header.local_player_name,
                    empires = header.empires.len(),
                    objects = restored.objects().len(),
                    diplomats = restored.diplomats().len(),
                    "session.restored"
                ),
                Err(err) => warn!(
                    target: "empire_sync::host",
                    path = %path.display(),
                    error = %err,
                    "session.load_failed"
                ),
            },
        }
    }

    for worker in workers {
        drop(worker.sender);
        if worker.handle.join().is_err() {
            warn!(
                target: "empire_sync::host",
                match_index = worker.index,
                "match.worker_panicked"
            );
        }
    }
}

#[derive(Debug)]
enum Command {
    Turn(u32),
    Claim {
        match_index: usize,
        civ: ObjectId,
        location: MapLocation,
        weight: i32,
    },
    Sync,
    Save {
        match_index: usize,
        path: PathBuf,
    },
    Load {
        path: PathBuf,
    },
}

#[derive(Debug)]
enum MatchCommand {
    Turn(u32),
    Claim {
        civ: ObjectId,
        location: MapLocation,
        weight: i32,
    },
    Sync,
    Save(PathBuf),
}

struct MatchWorker {
    index: usize,
    sender: Sender<MatchCommand>,
    handle: JoinHandle<()>,
}

fn broadcast(workers: &[MatchWorker], command: MatchCommand) {
    for worker in workers {
        let command = match &command {
            MatchCommand::Turn(turns) => MatchCommand::Turn(*turns),
            MatchCommand::Sync => MatchCommand::Sync,
            MatchCommand::Claim { .. } | MatchCommand::Save(_) => {
                warn!(
                    target: "empire_sync::host",
                    command = ?command,
                    "command.not_broadcastable"
                );
                return;
            }
        };
        if worker.sender.send(command).is_err() {
            warn!(target: "empire_sync::host", match_index = worker.index, "match.worker_gone");
        }
    }
}

fn send_to(workers: &[MatchWorker], match_index: usize, command: MatchCommand) {
    match workers.iter().find(|worker| worker.index == match_index) {
        Some(worker) => {
            if worker.sender.send(command).is_err() {
                warn!(target: "empire_sync::host", match_index, "match.worker_gone");
            }
        }
        None => warn!(
            target: "empire_sync::host",
            match_index,
            "command.rejected=unknown_match"
        ),
    }
}

fn spawn_command_listener() -> Receiver<Command> {
    let (sender, receiver) = unbounded::<Command>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(target: "empire_sync::host", error = %err, "command.read_failed");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_command(trimmed) {
                Some(command) => {
                    if sender.send(command).is_err() {
                        break;
                    }
                }
                None => warn!(target: "empire_sync::host", input = trimmed, "command.invalid"),
            }
        }
    });
    receiver
}

fn parse_command(input: &str) -> Option<Command> {
    let mut parts = input.split_whitespace();
    match parts.next()? {
        "turn" => {
            let turns = parts.next().unwrap_or("1").parse().ok()?;
            Some(Command::Turn(turns))
        }
        "claim" => {
            let match_index = parts.next()?.parse().ok()?;
            let civ = ObjectId::new(parts.next()?.parse().ok()?);
            let x = parts.next()?.parse().ok()?;
            let y = parts.next()?.parse().ok()?;
            let weight = parts.next()?.parse().ok()?;
            Some(Command::Claim {
                match_index,
                civ,
                location: MapLocation::new(x, y),
                weight,
            })
        }
        "sync" => Some(Command::Sync),
        "save" => {
            let match_index = parts.next()?.parse().ok()?;
            let path = PathBuf::from(parts.next()?);
            Some(Command::Save { match_index, path })
        }
        "load" => Some(Command::Load {
            path: PathBuf::from(parts.next()?),
        }),
        _ => None,
    }
}

#[derive(Debug, Error)]
enum HostError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

/// One authoritative match plus a mirror context per seated player.
struct HostedMatch {
    index: usize,
    config: Arc<SyncConfig>,
    context: Arc<SimulationContext>,
    lobby: Lobby,
    players: Vec<Player>,
    clients: Vec<Arc<SimulationContext>>,
}

fn civilizations() -> CivDatabase {
    CivDatabase::new([
        Civilization::new(ObjectId::new(0), "FEDERATION", "Federation"),
        Civilization::new(ObjectId::new(1), "KLINGONS", "Klingon"),
        Civilization::new(ObjectId::new(2), "ROMULANS", "Romulan"),
        Civilization::minor(ObjectId::new(3), "BAJORANS", "Bajoran"),
    ])
}

impl HostedMatch {
    fn new(index: usize, config: Arc<SyncConfig>) -> Result<Self, HostError> {
        let civs = civilizations();
        let mut lobby = Lobby::new(&civs, config.lobby())?;
        let mut options = GameOptions::default();
        options.freeze();
        let context = SimulationContext::new(civs, options, true);

        lobby.assign_player(ObjectId::new(0), Player::new(Player::GAME_HOST_ID, "Host"))?;
        lobby.assign_player(ObjectId::new(1), Player::new(1, "Guest"))?;
        let players: Vec<Player> = lobby
            .slots()
            .iter()
            .filter_map(|slot| slot.player().cloned())
            .collect();

        with_context(&context, || seed_galaxy(index as u64));
        let clients = players.iter().map(|_| context.empty_like()).collect();

        info!(
            target: "empire_sync::host",
            match_index = index,
            context_id = context.context_id(),
            players = players.len(),
            "match.started"
        );
        Ok(Self {
            index,
            config,
            context,
            lobby,
            players,
            clients,
        })
    }

    fn handle(&mut self, command: MatchCommand) {
        let result = match command {
            MatchCommand::Turn(turns) => {
                for _ in 0..turns {
                    self.advance_turn();
                }
                Ok(())
            }
            MatchCommand::Claim {
                civ,
                location,
                weight,
            } => {
                self.claim(civ, location, weight);
                Ok(())
            }
            MatchCommand::Sync => self.sync(),
            MatchCommand::Save(path) => self.save(path),
        };
        if let Err(err) = result {
            warn!(
                target: "empire_sync::host",
                match_index = self.index,
                error = %err,
                "match.command_failed"
            );
        }
    }

    fn advance_turn(&self) {
        let turn = with_context(&self.context, || {
            let context = SimulationContext::expect_current();
            let next = context.turn_number().next();
            context.set_turn_number(next);
            next
        });
        info!(
            target: "empire_sync::host",
            match_index = self.index,
            turn = %turn,
            "turn.completed"
        );
    }

    fn claim(&self, civ: ObjectId, location: MapLocation, weight: i32) {
        let claim = self
            .context
            .update_sector_claims(|claims| claims.add_claim(location, civ, weight));
        match claim {
            Some(claim) => info!(
                target: "empire_sync::host",
                match_index = self.index,
                claim = ?claim,
                word = claim.raw(),
                "claim.recorded"
            ),
            None => warn!(
                target: "empire_sync::host",
                match_index = self.index,
                civ = %civ,
                weight,
                "claim.rejected"
            ),
        }
    }

    fn sync(&self) -> Result<(), HostError> {
        let snapshots = TurnSnapshot::create_for_players(
            &self.context,
            &self.players,
            self.config.snapshot(),
        )?;
        let deliveries = self.players.iter().zip(&self.clients).zip(snapshots);
        for ((player, client), snapshot) in deliveries {
            let bytes = snapshot.encode()?;
            let checksum = sync_proto::payload_checksum(&bytes);
            TurnSnapshot::decode(&bytes)?.apply(client);
            info!(
                target: "empire_sync::host",
                match_index = self.index,
                player_id = player.player_id,
                bytes = bytes.len(),
                checksum,
                turn = %client.turn_number(),
                "snapshot.delivered"
            );
        }
        Ok(())
    }

    /// Writes the header and the host player's snapshot. Like any snapshot it
    /// carries only the host's own diplomat, so a restore reproduces the
    /// host's view of the match.
    fn save(&self, path: PathBuf) -> Result<(), HostError> {
        let path = if path.extension().is_none() {
            path.with_extension(self.config.saves().extension())
        } else {
            path
        };
        let host = self
            .players
            .iter()
            .find(|player| player.player_id == Player::GAME_HOST_ID)
            .cloned()
            .unwrap_or_else(Player::unassigned);
        let header = SessionHeader::from_context(&self.context, &host, Some(&self.lobby));
        let snapshot = TurnSnapshot::create_with(&self.context, &host, self.config.snapshot())?;

        let mut writer = BufWriter::new(File::create(&path)?);
        header.write_to(&mut writer)?;
        writer.write_all(&snapshot.encode()?)?;
        writer.flush()?;
        info!(
            target: "empire_sync::host",
            match_index = self.index,
            path = %path.display(),
            turn = %header.turn_number,
            "session.saved"
        );
        Ok(())
    }
}

/// Star systems at random sectors, one colony per empire and a diplomat each.
fn seed_galaxy(seed: u64) {
    let context = SimulationContext::expect_current();
    let mut rng = SmallRng::seed_from_u64(seed);
    let empires: Vec<ObjectId> = context
        .civilizations()
        .empires()
        .map(|civ| civ.civ_id)
        .collect();
    let all_civs: Vec<ObjectId> = context
        .civilizations()
        .iter()
        .map(|civ| civ.civ_id)
        .collect();

    context.update_objects(|objects| {
        for index in 0..SYSTEMS_PER_MATCH {
            let owner = empires.get(index).copied().unwrap_or(ObjectId::INVALID);
            let location =
                MapLocation::new(rng.gen_range(0..GALAXY_EDGE), rng.gen_range(0..GALAXY_EDGE));
            objects.insert(UniverseObject {
                object_id: context.generate_id(),
                owner_id: owner,
                location,
                kind: ObjectKind::StarSystem,
                name: format!("System {index}"),
            });
        }
    });

    let owned: Vec<_> = context
        .objects()
        .iter()
        .filter(|object| object.owner_id.is_valid())
        .map(|object| (object.owner_id, object.object_id, object.location))
        .collect();
    context.update_sector_claims(|claims| {
        for (owner, _, location) in &owned {
            claims.add_claim(*location, *owner, rng.gen_range(50..=150));
        }
    });
    context.update_managers(|managers| {
        for civ in &empires {
            let mut manager = CivilizationManager::new(*civ);
            manager.colony_ids = owned
                .iter()
                .filter(|(owner, _, _)| owner == civ)
                .map(|(_, object_id, _)| *object_id)
                .collect();
            managers.insert(manager);
        }
    });
    context.update_diplomats(|diplomats| {
        for civ in &empires {
            let mut diplomat = Diplomat::new(*civ);
            diplomat.seat_of_government_id = owned
                .iter()
                .find(|(owner, _, _)| owner == civ)
                .map_or(ObjectId::INVALID, |(_, object_id, _)| *object_id);
            diplomat.ensure_foreign_powers(all_civs.iter().copied());
            diplomats.insert(diplomat);
        }
    });
    context.set_turn_number(TurnNumber::new(1));
}

fn spawn_match_worker(mut hosted: HostedMatch) -> MatchWorker {
    let index = hosted.index;
    let (sender, receiver) = unbounded::<MatchCommand>();
    let handle = thread::Builder::new()
        .name(format!("match-{index}"))
        .spawn(move || {
            while let Ok(command) = receiver.recv() {
                hosted.handle(command);
            }
        })
        .expect("match worker spawn failed");
    MatchWorker {
        index,
        sender,
        handle,
    }
}

fn load_session(path: &Path) -> Result<(SessionHeader, TurnSnapshot), HostError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut header = SessionHeader::read_from(&mut reader)?;
    header.file_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned());
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    let snapshot = TurnSnapshot::decode(&payload)?;
    Ok((header, snapshot))
}

/// Loads a save into a new context built from the header's options.
fn restore_session(path: &Path) -> Result<(SessionHeader, Arc<SimulationContext>), HostError> {
    let (header, snapshot) = load_session(path)?;
    let context = SimulationContext::new(
        civilizations(),
        header.options.clone(),
        header.is_multiplayer,
    );
    snapshot.apply(&context);
    Ok((header, context))
}
