use crossbeam_channel::{Receiver, Sender, unbounded};
use lodgen_world::{GenerationMode, Tile, TileGrid};

/// Downstream consumer of finished sub-grids. Takes ownership of the tiles.
pub trait TileSink: Send + Sync {
    fn accept(&self, grid: TileGrid<Tile>, mode: GenerationMode);
}

pub struct Delivery {
    pub grid: TileGrid<Tile>,
    pub mode: GenerationMode,
}

/// Forwards deliveries over an unbounded channel.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<Delivery>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Delivery>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl TileSink for ChannelSink {
    fn accept(&self, grid: TileGrid<Tile>, mode: GenerationMode) {
        // receiver gone means nobody wants the tiles any more
        let _ = self.tx.send(Delivery { grid, mode });
    }
}

/// Drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl TileSink for NullSink {
    fn accept(&self, _grid: TileGrid<Tile>, _mode: GenerationMode) {}
}
