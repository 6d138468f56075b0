#[macro_use] extern crate rocket;

use rocket::{Build, Rocket};
use crate::db::DbFairing;

mod api;
mod availability;
mod booking;
mod config;
mod db;
mod error;
mod query;
mod seed;
mod storage;
mod studiotime;

pub(crate) fn build(rocket: Rocket<Build>) -> Rocket<Build> {
    let rocket = rocket.attach(DbFairing());
    api::extend(rocket)
}

#[launch]
fn rocket() -> _ {
    build(rocket::build())
}
