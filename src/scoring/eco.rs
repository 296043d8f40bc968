use serde::Serialize;

/// kg of CO2 emitted per km by a solo car trip.
pub const CO2_PER_KM: f64 = 0.21;
/// Share of the solo emissions avoided by pooling the trip.
pub const SHARING_REDUCTION: f64 = 0.5;
/// kg of CO2 a tree absorbs per year.
pub const CO2_PER_TREE_PER_YEAR: f64 = 21.0;
/// Solo travel cost per km, in rupees.
pub const COST_PER_KM_SOLO: f64 = 12.0;
/// Distance assumed for a completed ride when no route length is stored.
pub const AVG_RIDE_DISTANCE_KM: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EcoImpact {
    pub co2_saved_kg: f64,
    pub trees_equivalent: f64,
    pub money_saved: f64,
}

impl EcoImpact {
    pub const ZERO: EcoImpact = EcoImpact {
        co2_saved_kg: 0.0,
        trees_equivalent: 0.0,
        money_saved: 0.0,
    };
}

/// Savings attributed to sharing `distance_km` instead of driving alone.
/// Negative or non-finite distances yield zero impact.
pub fn compute_eco_impact(distance_km: f64) -> EcoImpact {
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return EcoImpact::ZERO;
    }

    let co2_saved_kg = distance_km * CO2_PER_KM * SHARING_REDUCTION;
    EcoImpact {
        co2_saved_kg,
        trees_equivalent: co2_saved_kg / CO2_PER_TREE_PER_YEAR,
        money_saved: distance_km * COST_PER_KM_SOLO * SHARING_REDUCTION,
    }
}
