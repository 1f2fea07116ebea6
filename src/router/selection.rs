use crate::protocol::{AgentId, RouteId, SegmentId};
use std::collections::HashSet;

/// How the router decides which vehicles a hazard concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffectedScope {
    /// Vehicles on the hazard's segment, upstream of it
    Segment,
    /// Vehicles whose route is one of these. On the hazard segment itself
    /// only upstream vehicles qualify; segments past the hazard never do.
    Routes(HashSet<RouteId>),
}

impl AffectedScope {
    /// Empty route list means segment-based selection.
    pub fn from_routes<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RouteId>,
    {
        let routes: HashSet<RouteId> = routes.into_iter().map(Into::into).collect();
        if routes.is_empty() {
            AffectedScope::Segment
        } else {
            AffectedScope::Routes(routes)
        }
    }

    pub fn needs_routes(&self) -> bool {
        matches!(self, AffectedScope::Routes(_))
    }
}

/// Where the stopped vehicle is.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardSite {
    pub agent: AgentId,
    pub segment: SegmentId,
    pub lane_position: f64,
    /// Segments that follow `segment` along the road
    pub downstream: HashSet<SegmentId>,
}

impl HazardSite {
    pub fn new(agent: AgentId, segment: SegmentId, lane_position: f64) -> Self {
        Self {
            agent,
            segment,
            lane_position,
            downstream: HashSet::new(),
        }
    }

    pub fn with_downstream(mut self, downstream: HashSet<SegmentId>) -> Self {
        self.downstream = downstream;
        self
    }
}

/// The parts of a vehicle's state selection looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleView {
    pub agent: AgentId,
    pub segment: SegmentId,
    pub lane_position: f64,
    pub route: Option<RouteId>,
}

/// Vehicles that must be told to evade `site`, in input order.
///
/// The hazard vehicle itself is never selected. Travel is towards increasing
/// lane position, so upstream means a smaller offset on the same segment.
pub fn select_affected<'a>(
    site: &HazardSite,
    vehicles: &'a [VehicleView],
    scope: &AffectedScope,
) -> Vec<&'a VehicleView> {
    vehicles
        .iter()
        .filter(|v| v.agent != site.agent)
        .filter(|v| {
            let upstream = v.lane_position < site.lane_position;
            let same_segment = v.segment == site.segment;
            match scope {
                AffectedScope::Segment => same_segment && upstream,
                AffectedScope::Routes(routes) => {
                    let on_route = v.route.as_ref().is_some_and(|r| routes.contains(r));
                    let passed = !same_segment && site.downstream.contains(&v.segment);
                    on_route && !passed && (!same_segment || upstream)
                }
            }
        })
        .collect()
}
