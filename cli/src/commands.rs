pub mod cityhall;
pub mod extract;
pub mod landuse;
pub mod naturalearth;
pub mod population;
pub mod regions;
