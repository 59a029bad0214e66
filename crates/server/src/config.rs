use clap::Parser;

use keepwatch::{DEFAULT_PORT, NETWORK_UPDATE_RATE, TICK_RATE};

/// CLI surface (§6 "CLI / environment surface"). Parses straight into
/// [`ServerConfig`]; flags rather than a config file, matching the teacher's
/// `Args`/`ServerConfig` split.
#[derive(Debug, Parser)]
#[command(name = "keepwatch-server")]
#[command(about = "Keepwatch authoritative game server")]
pub struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, default_value_t = TICK_RATE)]
    pub tick_rate: u32,

    #[arg(long, default_value_t = NETWORK_UPDATE_RATE)]
    pub network_rate: u32,

    #[arg(short, long, default_value_t = 100)]
    pub max_players: usize,

    #[arg(long, default_value_t = 0)]
    pub world_seed: u64,

    /// Ticks of lag-comp history to retain; must cover at least `MAX_REWIND_TIME`.
    #[arg(long, default_value_t = 64)]
    pub history_capacity: usize,

    /// Default collision mask used until a client uploads one (§4.4).
    #[arg(long, default_value_t = 200)]
    pub world_width_tiles: u32,

    #[arg(long, default_value_t = 200)]
    pub world_height_tiles: u32,

    #[arg(long, default_value_t = 32.0)]
    pub tile_size: f32,

    #[arg(long)]
    pub headless: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_rate: u32,
    pub network_rate: u32,
    pub max_players: usize,
    pub world_seed: u64,
    pub history_capacity: usize,
    pub world_width_tiles: u32,
    pub world_height_tiles: u32,
    pub tile_size: f32,
    pub headless: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            tick_rate: TICK_RATE,
            network_rate: NETWORK_UPDATE_RATE,
            max_players: 100,
            world_seed: 0,
            history_capacity: 64,
            world_width_tiles: 200,
            world_height_tiles: 200,
            tile_size: 32.0,
            headless: false,
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            bind_addr: format!("{}:{}", args.bind, args.port),
            tick_rate: args.tick_rate,
            network_rate: args.network_rate,
            max_players: args.max_players,
            world_seed: args.world_seed,
            history_capacity: args.history_capacity,
            world_width_tiles: args.world_width_tiles,
            world_height_tiles: args.world_height_tiles,
            tile_size: args.tile_size,
            headless: args.headless,
        }
    }
}
