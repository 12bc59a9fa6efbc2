// Voxel identity as seen by the pathfinder.
//
// `Voxel` is the closed set of terrain identities that the classifier in
// `walk.rs` distinguishes. Each value carries its full derived state (door
// open/facing/hinge, gate open/facing, liquid decay) so a sampler hands back
// one complete immutable value per lookup; nothing is patched in afterwards.
//
// Geometry lives here too: `local_shapes()` gives a voxel's collision boxes
// in voxel-local units. Fence and wall arms depend on neighbors, so they are
// assembled by `TerrainSampler::collision_boxes()` in `terrain.rs` from the
// post shape here plus `connects_to_post()` on each horizontal neighbor.
//
// `is_pathfindable()` is the traversal-medium predicate (land/water/air)
// used by raw classification and by airborne start-node resolution.
//
// See also: `terrain.rs` for the sampler trait that serves voxels,
// `walk.rs` for classification.

use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::types::Facing;

/// Door construction material. Only wooden doors can be opened by mobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorMaterial {
    Wood,
    Iron,
}

/// The two liquids a mob may be configured to stand on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Liquid {
    Water,
    Lava,
}

/// Medium a traversal check is made for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraversalMedium {
    Land,
    Water,
    Air,
}

/// The identity of a single voxel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Voxel {
    #[default]
    Air,
    /// Any full solid cube without special pathing rules (stone, dirt, planks).
    Solid,
    /// Non-colliding vegetation (grass, flowers, saplings).
    Plant,
    DeadBush,
    Leaves,
    /// `decay` is 0 for a source, 1..=7 for flowing; `falling` for a column.
    Water { decay: u8, falling: bool },
    Lava { decay: u8, falling: bool },
    Fire,
    Magma,
    LavaCauldron,
    Cactus,
    SweetBerryBush,
    CocoaPod,
    LilyPad,
    PowderSnow,
    HoneyBlock,
    Trapdoor { open: bool, facing: Facing },
    Door {
        material: DoorMaterial,
        open: bool,
        facing: Facing,
        hinge_right: bool,
    },
    Rail,
    Fence,
    Wall,
    FenceGate { open: bool, facing: Facing },
    /// Bottom half slab.
    Slab,
    Anvil,
    BrewingStand,
    DragonEgg,
    EndRod,
}

/// One sixteenth of a voxel, the unit collision shapes are authored in.
const PX: f64 = 1.0 / 16.0;

/// Height of fence, wall, and gate collision (they block jumping over).
const POST_HEIGHT: f64 = 1.5;

const FULL_CUBE: [f64; 6] = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

impl Voxel {
    /// A still water source.
    pub const WATER: Voxel = Voxel::Water {
        decay: 0,
        falling: false,
    };

    /// A still lava source.
    pub const LAVA: Voxel = Voxel::Lava {
        decay: 0,
        falling: false,
    };

    pub fn is_air(self) -> bool {
        self == Voxel::Air
    }

    pub fn is_water(self) -> bool {
        matches!(self, Voxel::Water { .. })
    }

    pub fn is_lava(self) -> bool {
        matches!(self, Voxel::Lava { .. })
    }

    pub fn is_source_water(self) -> bool {
        matches!(
            self,
            Voxel::Water {
                decay: 0,
                falling: false
            }
        )
    }

    pub fn liquid(self) -> Option<Liquid> {
        match self {
            Voxel::Water { .. } => Some(Liquid::Water),
            Voxel::Lava { .. } => Some(Liquid::Lava),
            _ => None,
        }
    }

    /// Fraction of the voxel the liquid surface sits below, in ninths.
    /// Falling columns count as decay 0. Non-liquids return 0.
    pub fn fluid_height_percent(self) -> f64 {
        match self {
            Voxel::Water { decay, falling } | Voxel::Lava { decay, falling } => {
                let decay = if falling { 0 } else { decay };
                (f64::from(decay) + 1.0) / 9.0
            }
            _ => 0.0,
        }
    }

    /// Fire-like voxels that hurt on contact.
    pub fn is_burning(self) -> bool {
        matches!(
            self,
            Voxel::Fire | Voxel::Lava { .. } | Voxel::Magma | Voxel::LavaCauldron
        )
    }

    /// Voxels that hurt on contact without burning.
    pub fn is_contact_hazard(self) -> bool {
        matches!(self, Voxel::Cactus | Voxel::SweetBerryBush)
    }

    pub fn is_door(self) -> bool {
        matches!(self, Voxel::Door { .. })
    }

    pub fn is_rail(self) -> bool {
        self == Voxel::Rail
    }

    /// True if the collision shape fills the whole voxel.
    pub fn is_full_cube(self) -> bool {
        matches!(self, Voxel::Solid | Voxel::Leaves | Voxel::Magma)
    }

    /// True if the voxel's collision geometry blocks entity movement.
    pub fn is_solid(self) -> bool {
        !matches!(
            self,
            Voxel::Air
                | Voxel::Plant
                | Voxel::DeadBush
                | Voxel::Water { .. }
                | Voxel::Lava { .. }
                | Voxel::Fire
                | Voxel::SweetBerryBush
                | Voxel::CocoaPod
                | Voxel::PowderSnow
                | Voxel::Rail
        )
    }

    /// Fences and walls get arms toward voxels for which this is true.
    pub fn connects_to_post(self) -> bool {
        matches!(self, Voxel::Fence | Voxel::Wall | Voxel::FenceGate { .. }) || self.is_full_cube()
    }

    /// Collision boxes in voxel-local units, `[min_x, min_y, min_z, max_x,
    /// max_y, max_z]`. Fence and wall entries are the bare post; arms are
    /// added by the sampler.
    pub fn local_shapes(self) -> SmallVec<[[f64; 6]; 2]> {
        match self {
            Voxel::Air
            | Voxel::Plant
            | Voxel::DeadBush
            | Voxel::Water { .. }
            | Voxel::Lava { .. }
            | Voxel::Fire
            | Voxel::SweetBerryBush
            | Voxel::PowderSnow
            | Voxel::Rail => SmallVec::new(),
            Voxel::Solid | Voxel::Leaves | Voxel::Magma | Voxel::LavaCauldron => {
                smallvec![FULL_CUBE]
            }
            Voxel::Cactus => smallvec![[PX, 0.0, PX, 15.0 * PX, 15.0 * PX, 15.0 * PX]],
            Voxel::HoneyBlock => smallvec![[PX, 0.0, PX, 15.0 * PX, 15.0 * PX, 15.0 * PX]],
            Voxel::CocoaPod => {
                smallvec![[4.0 * PX, 3.0 * PX, 4.0 * PX, 12.0 * PX, 12.0 * PX, 12.0 * PX]]
            }
            Voxel::LilyPad => smallvec![[PX, 0.0, PX, 15.0 * PX, 1.5 * PX, 15.0 * PX]],
            Voxel::Slab => smallvec![[0.0, 0.0, 0.0, 1.0, 0.5, 1.0]],
            Voxel::Trapdoor { open, facing } => {
                if open {
                    smallvec![panel(facing.opposite(), 3.0 * PX, 1.0)]
                } else {
                    smallvec![[0.0, 0.0, 0.0, 1.0, 3.0 * PX, 1.0]]
                }
            }
            Voxel::Door {
                open,
                facing,
                hinge_right,
                ..
            } => {
                let side = match (open, hinge_right) {
                    (false, _) => facing,
                    (true, true) => facing.clockwise(),
                    (true, false) => facing.counter_clockwise(),
                };
                smallvec![panel(side, 3.0 * PX, 1.0)]
            }
            Voxel::Fence => smallvec![[6.0 * PX, 0.0, 6.0 * PX, 10.0 * PX, POST_HEIGHT, 10.0 * PX]],
            Voxel::Wall => smallvec![[4.0 * PX, 0.0, 4.0 * PX, 12.0 * PX, POST_HEIGHT, 12.0 * PX]],
            Voxel::FenceGate { open, facing } => {
                if open {
                    SmallVec::new()
                } else if facing.is_z_axis() {
                    smallvec![[0.0, 0.0, 6.0 * PX, 1.0, POST_HEIGHT, 10.0 * PX]]
                } else {
                    smallvec![[6.0 * PX, 0.0, 0.0, 10.0 * PX, POST_HEIGHT, 1.0]]
                }
            }
            Voxel::Anvil => smallvec![[2.0 * PX, 0.0, 0.0, 14.0 * PX, 1.0, 1.0]],
            Voxel::BrewingStand => smallvec![
                [0.0, 0.0, 0.0, 1.0, 2.0 * PX, 1.0],
                [7.0 * PX, 0.0, 7.0 * PX, 9.0 * PX, 14.0 * PX, 9.0 * PX]
            ],
            Voxel::DragonEgg => smallvec![[PX, 0.0, PX, 15.0 * PX, 1.0, 15.0 * PX]],
            Voxel::EndRod => smallvec![[6.0 * PX, 0.0, 6.0 * PX, 10.0 * PX, 1.0, 10.0 * PX]],
        }
    }

    /// Local box for a fence or wall arm reaching from the post toward `side`.
    /// `None` for voxels without arms.
    pub fn arm_shape(self, side: Facing) -> Option<[f64; 6]> {
        let (lo, hi) = match self {
            Voxel::Fence => (6.0 * PX, 10.0 * PX),
            Voxel::Wall => (5.0 * PX, 11.0 * PX),
            _ => return None,
        };
        let h = POST_HEIGHT;
        Some(match side {
            Facing::North => [lo, 0.0, 0.0, hi, h, lo],
            Facing::South => [lo, 0.0, hi, hi, h, 1.0],
            Facing::West => [0.0, 0.0, lo, lo, h, hi],
            Facing::East => [hi, 0.0, lo, 1.0, h, hi],
        })
    }
}

/// A full-height panel of the given thickness hugging the `side` edge.
fn panel(side: Facing, thickness: f64, height: f64) -> [f64; 6] {
    match side {
        Facing::North => [0.0, 0.0, 0.0, 1.0, height, thickness],
        Facing::South => [0.0, 0.0, 1.0 - thickness, 1.0, height, 1.0],
        Facing::West => [0.0, 0.0, 0.0, thickness, height, 1.0],
        Facing::East => [1.0 - thickness, 0.0, 0.0, 1.0, height, 1.0],
    }
}

/// Whether `voxel` can be moved through by something travelling in `medium`.
///
/// Doors follow their open state for land and air and never pass water.
/// Slabs are treated as blocking until partial-height support exists. A few
/// fixtures always block. Dead bushes let flying movers through. Everything
/// else passes land/air unless it is a full cube, and passes water only if
/// it is water.
pub fn is_pathfindable(voxel: Voxel, medium: TraversalMedium) -> bool {
    match voxel {
        Voxel::Door { open, .. } => match medium {
            TraversalMedium::Land | TraversalMedium::Air => open,
            TraversalMedium::Water => false,
        },
        Voxel::Slab => false,
        Voxel::Anvil | Voxel::BrewingStand | Voxel::DragonEgg | Voxel::EndRod => false,
        Voxel::DeadBush if medium == TraversalMedium::Air => true,
        _ => default_pathfindable(voxel, medium),
    }
}

fn default_pathfindable(voxel: Voxel, medium: TraversalMedium) -> bool {
    match medium {
        TraversalMedium::Land | TraversalMedium::Air => !voxel.is_full_cube(),
        TraversalMedium::Water => voxel.is_water(),
    }
}
