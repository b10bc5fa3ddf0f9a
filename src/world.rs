use rand::Rng;

use crate::error::ConfigurationError;

/// One cell packed as an RGBA8 texel: state replicated in RGB, alpha opaque.
pub type Texel = [u8; 4];

pub const ALIVE: Texel = [255, 255, 255, 255];
pub const DEAD: Texel = [0, 0, 0, 255];

#[inline]
pub fn texel_is_alive(texel: Texel) -> bool {
    texel[0] > 127
}

#[inline]
pub fn texel_for(alive: bool) -> Texel {
    if alive {
        ALIVE
    } else {
        DEAD
    }
}

/// Index into a two-slot buffer arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }

    #[inline]
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Read/write roles for one simulation pass. `write` is always `read.other()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSlots {
    pub read: Slot,
    pub write: Slot,
}

impl PassSlots {
    pub fn from_current(current: Slot) -> Self {
        Self {
            read: current,
            write: current.other(),
        }
    }
}

/// Toroidal grid of cells held in two alternating buffers.
///
/// The grid does not know which slot is current; that index belongs to the
/// scheduler and is passed in on every access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldState {
    width: u32,
    height: u32,
    buffers: [Vec<Texel>; 2],
}

impl WorldState {
    /// All-dead grid in both slots.
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigurationError> {
        if width == 0 || height == 0 {
            return Err(ConfigurationError::EmptyGrid { width, height });
        }
        let cells = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            buffers: [vec![DEAD; cells], vec![DEAD; cells]],
        })
    }

    /// Slot A seeded with each cell alive with probability 0.5.
    pub fn seeded<R: Rng + ?Sized>(
        width: u32,
        height: u32,
        rng: &mut R,
    ) -> Result<Self, ConfigurationError> {
        let mut world = Self::new(width, height)?;
        for texel in world.buffers[Slot::A.index()].iter_mut() {
            *texel = texel_for(rng.gen_bool(0.5));
        }
        Ok(world)
    }

    /// Slot A with exactly the listed cells alive.
    pub fn from_live_cells(
        width: u32,
        height: u32,
        cells: &[(u32, u32)],
    ) -> Result<Self, ConfigurationError> {
        let mut world = Self::new(width, height)?;
        for &(x, y) in cells {
            let (x, y) = world.wrap(x as i64, y as i64);
            let idx = world.index(x, y);
            world.buffers[Slot::A.index()][idx] = ALIVE;
        }
        Ok(world)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Wraps any integer coordinate onto the torus.
    #[inline]
    pub fn wrap(&self, x: i64, y: i64) -> (u32, u32) {
        wrap_coord(x, y, self.width, self.height)
    }

    pub fn texels(&self, slot: Slot) -> &[Texel] {
        &self.buffers[slot.index()]
    }

    pub fn is_alive(&self, slot: Slot, x: u32, y: u32) -> bool {
        texel_is_alive(self.buffers[slot.index()][self.index(x, y)])
    }

    pub fn population(&self, slot: Slot) -> usize {
        self.buffers[slot.index()]
            .iter()
            .filter(|t| texel_is_alive(**t))
            .count()
    }

    /// Borrows the read slot immutably and the other slot mutably.
    pub fn split(&mut self, slots: PassSlots) -> (&[Texel], &mut [Texel]) {
        debug_assert_eq!(slots.write, slots.read.other());
        let [a, b] = &mut self.buffers;
        match slots.read {
            Slot::A => (a.as_slice(), b.as_mut_slice()),
            Slot::B => (b.as_slice(), a.as_mut_slice()),
        }
    }

    /// Raw RGBA bytes of a slot, as uploaded to a texture.
    pub fn bytes(&self, slot: Slot) -> &[u8] {
        bytemuck::cast_slice(&self.buffers[slot.index()])
    }
}

#[inline]
pub fn wrap_coord(x: i64, y: i64, width: u32, height: u32) -> (u32, u32) {
    (
        x.rem_euclid(width as i64) as u32,
        y.rem_euclid(height as i64) as u32,
    )
}
