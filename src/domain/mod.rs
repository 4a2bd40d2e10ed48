pub mod badges;
pub mod constants;
pub mod entities;
pub mod projection;
pub mod value_objects;
