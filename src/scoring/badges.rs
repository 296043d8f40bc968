use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Requirement {
    Rides(i64),
    Co2Kg(f64),
}

struct BadgeDefinition {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    requirement: Requirement,
}

const BADGES: &[BadgeDefinition] = &[
    BadgeDefinition {
        id: "first_ride",
        name: "First Ride",
        description: "Completed your first ride",
        icon: "🎉",
        requirement: Requirement::Rides(1),
    },
    BadgeDefinition {
        id: "rides_5",
        name: "Rising Star",
        description: "Completed 5 rides",
        icon: "⭐",
        requirement: Requirement::Rides(5),
    },
    BadgeDefinition {
        id: "rides_10",
        name: "Road Warrior",
        description: "Completed 10 rides",
        icon: "🏆",
        requirement: Requirement::Rides(10),
    },
    BadgeDefinition {
        id: "rides_25",
        name: "Campus Hero",
        description: "Completed 25 rides",
        icon: "🦸",
        requirement: Requirement::Rides(25),
    },
    BadgeDefinition {
        id: "eco_warrior",
        name: "Eco Warrior",
        description: "Saved 50kg CO2",
        icon: "🌱",
        requirement: Requirement::Co2Kg(50.0),
    },
    BadgeDefinition {
        id: "eco_champion",
        name: "Eco Champion",
        description: "Saved 100kg CO2",
        icon: "🌍",
        requirement: Requirement::Co2Kg(100.0),
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub earned: bool,
}

/// Badges earned for the given completed-ride count and CO2 savings, in
/// definition order.
pub fn evaluate_badges(completed_rides: i64, co2_saved_kg: f64) -> Vec<Badge> {
    BADGES
        .iter()
        .filter(|def| match def.requirement {
            Requirement::Rides(n) => completed_rides >= n,
            Requirement::Co2Kg(kg) => co2_saved_kg.is_finite() && co2_saved_kg >= kg,
        })
        .map(|def| Badge {
            id: def.id,
            name: def.name,
            description: def.description,
            icon: def.icon,
            earned: true,
        })
        .collect()
}
