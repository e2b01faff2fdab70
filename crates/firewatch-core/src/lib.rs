pub mod assemble;
pub mod corridor;
pub mod error;
pub mod feature;
pub mod models;
pub mod risk;
pub mod spatial;
pub mod timeline;
pub mod wind;

pub use assemble::{annotate_feature, score_features, AssembledRisk, RiskSummary};
pub use corridor::Corridor;
pub use error::GeoError;
pub use feature::{dedupe_features, Feature};
pub use models::{Hotspot, HotspotProperties, MonitoredLine, WindForecast, WindSample, LAYER_PROPERTY};
pub use risk::{
    build_wind_cone, horizon_key, normalize_horizons, HorizonWind, RiskAnnotation, RiskEngine,
    RiskInputs, RiskModel, RiskRules, WeightedRiskModel, WindSchedule, DEFAULT_HORIZONS_H,
};
pub use spatial::{haversine_distance, Position};
pub use timeline::{build_wind_timeline, TimelineEntry};
pub use wind::{bearing_to_toward, estimate_speed_at_height, WindProfile, WindProfileSet, WindReading};
