//! Vegetation species and the placement decision table

use std::fmt;

/// Kinds of instanced vegetation. Every species forms one batch per chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Species {
    BroadleafTree,
    ConiferTree,
    Bush,
    FlowerStem,
    FlowerHead,
    FlowerLeaf,
    FreestandingRock,
    RockCluster,
}

impl Species {
    pub const ALL: [Species; 8] = [
        Species::BroadleafTree,
        Species::ConiferTree,
        Species::Bush,
        Species::FlowerStem,
        Species::FlowerHead,
        Species::FlowerLeaf,
        Species::FreestandingRock,
        Species::RockCluster,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Species::BroadleafTree => "tree-broadleaf",
            Species::ConiferTree => "tree-conifer",
            Species::Bush => "bush",
            Species::FlowerStem => "flower-stem",
            Species::FlowerHead => "flower-head",
            Species::FlowerLeaf => "flower-leaf",
            Species::FreestandingRock => "freestanding-rock",
            Species::RockCluster => "rock-cluster",
        }
    }

    /// Whether instances of this species carry their own colour.
    pub fn is_tinted(self) -> bool {
        matches!(
            self,
            Species::BroadleafTree | Species::ConiferTree | Species::Bush | Species::FlowerHead
        )
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What a single candidate point turns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// 2-5 rocks scattered around the point
    RockCluster,
    /// One broadleaf or conifer tree
    Tree,
    Bush,
    /// 3-7 stems with heads and leaves
    FlowerCluster,
    SingleRock,
}

/// Which slopes a band applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlopeRule {
    SteepOnly,
    GentleOnly,
    Any,
}

impl SlopeRule {
    fn admits(self, steep: bool) -> bool {
        match self {
            SlopeRule::SteepOnly => steep,
            SlopeRule::GentleOnly => !steep,
            SlopeRule::Any => true,
        }
    }
}

/// One row of the decision table: `draw < limit` (times favourability when
/// `scaled`) on an admitted slope selects `placement`.
#[derive(Clone, Copy, Debug)]
pub struct PlacementBand {
    pub placement: Placement,
    pub limit: f64,
    pub scaled: bool,
    pub slope: SlopeRule,
}

/// Evaluated top to bottom; the first matching band wins. Draws above every
/// limit place nothing.
pub const PLACEMENT_BANDS: [PlacementBand; 5] = [
    PlacementBand { placement: Placement::RockCluster, limit: 0.6, scaled: false, slope: SlopeRule::SteepOnly },
    PlacementBand { placement: Placement::Tree, limit: 0.3, scaled: true, slope: SlopeRule::GentleOnly },
    PlacementBand { placement: Placement::Bush, limit: 0.6, scaled: true, slope: SlopeRule::GentleOnly },
    PlacementBand { placement: Placement::FlowerCluster, limit: 0.7, scaled: true, slope: SlopeRule::GentleOnly },
    PlacementBand { placement: Placement::SingleRock, limit: 0.8, scaled: true, slope: SlopeRule::Any },
];

/// Surface normals with y below this count as steep.
pub const STEEP_NORMAL_Y: f64 = 0.7;

/// `clamp(elevation / 15, 0.3, 1)`: higher ground admits more vegetation.
pub fn elevation_favorability(elevation: f64) -> f64 {
    (elevation / 15.0).clamp(0.3, 1.0)
}

pub fn select_placement(draw: f64, steep: bool, favorability: f64) -> Option<Placement> {
    PLACEMENT_BANDS
        .iter()
        .find(|band| {
            let limit = if band.scaled { band.limit * favorability } else { band.limit };
            band.slope.admits(steep) && draw < limit
        })
        .map(|band| band.placement)
}
