//! Fixed campus reference data served to clients and used for validation.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PickupPoint {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NamedEntry {
    pub id: &'static str,
    pub name: &'static str,
}

pub const PICKUP_POINTS: &[PickupPoint] = &[
    PickupPoint { id: "main_gate", name: "Main Gate", description: "RVCE Main Entrance" },
    PickupPoint { id: "library", name: "Central Library", description: "Near Library Building" },
    PickupPoint { id: "canteen", name: "Main Canteen", description: "Central Canteen Area" },
    PickupPoint { id: "cse_block", name: "CSE Block", description: "Computer Science Building" },
    PickupPoint { id: "ece_block", name: "ECE Block", description: "Electronics Building" },
    PickupPoint { id: "mech_block", name: "Mechanical Block", description: "Mechanical Engineering Building" },
    PickupPoint { id: "civil_block", name: "Civil Block", description: "Civil Engineering Building" },
    PickupPoint { id: "admin_block", name: "Admin Block", description: "Administrative Building" },
    PickupPoint { id: "hostel_gate", name: "Hostel Gate", description: "Boys/Girls Hostel Entrance" },
    PickupPoint { id: "sports_complex", name: "Sports Complex", description: "Near Playground/Gym" },
    PickupPoint { id: "parking_lot", name: "Parking Lot", description: "Main Parking Area" },
    PickupPoint { id: "back_gate", name: "Back Gate", description: "Rear Campus Exit" },
];

pub const BRANCHES: &[NamedEntry] = &[
    NamedEntry { id: "cse", name: "Computer Science" },
    NamedEntry { id: "ise", name: "Information Science" },
    NamedEntry { id: "ece", name: "Electronics & Communication" },
    NamedEntry { id: "eee", name: "Electrical & Electronics" },
    NamedEntry { id: "me", name: "Mechanical Engineering" },
    NamedEntry { id: "cv", name: "Civil Engineering" },
    NamedEntry { id: "bt", name: "Biotechnology" },
    NamedEntry { id: "ch", name: "Chemical Engineering" },
    NamedEntry { id: "im", name: "Industrial Management" },
    NamedEntry { id: "te", name: "Telecommunication" },
];

pub const ACADEMIC_YEARS: &[NamedEntry] = &[
    NamedEntry { id: "1", name: "1st Year" },
    NamedEntry { id: "2", name: "2nd Year" },
    NamedEntry { id: "3", name: "3rd Year" },
    NamedEntry { id: "4", name: "4th Year" },
];

pub fn pickup_point_name(id: &str) -> Option<&'static str> {
    PICKUP_POINTS.iter().find(|p| p.id == id).map(|p| p.name)
}

pub fn branch_name(id: &str) -> Option<&'static str> {
    BRANCHES.iter().find(|b| b.id == id).map(|b| b.name)
}

pub fn academic_year_name(id: &str) -> Option<&'static str> {
    ACADEMIC_YEARS.iter().find(|y| y.id == id).map(|y| y.name)
}
