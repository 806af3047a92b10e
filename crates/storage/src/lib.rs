pub mod db;
pub mod repositories;
mod row;
