//! Shared setup for integration tests.
//!
//! Every test gets its own in-memory SQLite database. The pool is capped at
//! one connection so all statements see the same database.

#![allow(dead_code)]

pub mod entities;

use common::telemetry::init_tracing;
use common::{DatabaseConfig, LoggingConfig};
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ConnectionTrait, DatabaseConnection, EntityTrait, Schema,
};
use specification::{Database, DbUnitOfWork};

use entities::{address, customer, order, tag};

/// Connect, create the schema and seed the fixture rows.
pub async fn setup() -> DatabaseConnection {
    init_tracing(&LoggingConfig::from_env());

    let config = DatabaseConfig {
        max_connections: 1,
        ..DatabaseConfig::with_url("sqlite::memory:")
    };
    let db = Database::connect(&config)
        .await
        .expect("Failed to connect to sqlite")
        .get_connection();

    create_schema(&db).await;
    seed(&db).await;
    db
}

/// Fresh unit of work over a seeded database.
pub async fn unit_of_work() -> (DbUnitOfWork, DatabaseConnection) {
    let db = setup().await;
    (DbUnitOfWork::new(db.clone()), db)
}

async fn create_schema(db: &DatabaseConnection) {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    db.execute(backend.build(&schema.create_table_from_entity(customer::Entity)))
        .await
        .expect("Failed to create customers");
    db.execute(backend.build(&schema.create_table_from_entity(order::Entity)))
        .await
        .expect("Failed to create orders");
    db.execute(backend.build(&schema.create_table_from_entity(address::Entity)))
        .await
        .expect("Failed to create addresses");
    db.execute(backend.build(&schema.create_table_from_entity(tag::Entity)))
        .await
        .expect("Failed to create tags");
}

async fn seed(db: &DatabaseConnection) {
    customer::Entity::insert_many([
        new_customer(1, "Ada", "London"),
        new_customer(2, "Grace", "Arlington"),
        new_customer(3, "Alan", "London"),
        new_customer(4, "Barbara", "Boston"),
        new_customer(5, "Edsger", "Nuenen"),
    ])
    .exec_without_returning(db)
    .await
    .expect("Failed to seed customers");

    order::Entity::insert_many([
        new_order(10, 1, 120),
        new_order(11, 1, 80),
        new_order(12, 2, 45),
        new_order(13, 3, 300),
    ])
    .exec_without_returning(db)
    .await
    .expect("Failed to seed orders");

    address::Entity::insert_many([
        new_address(100, 1, "12 St James's Square"),
        new_address(101, 4, "77 Massachusetts Ave"),
    ])
    .exec_without_returning(db)
    .await
    .expect("Failed to seed addresses");
}

pub fn new_customer(id: i32, name: &str, city: &str) -> customer::ActiveModel {
    customer::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        city: Set(city.to_string()),
    }
}

pub fn new_order(id: i32, customer_id: i32, total: i32) -> order::ActiveModel {
    order::ActiveModel {
        id: Set(id),
        customer_id: Set(customer_id),
        total: Set(total),
    }
}

pub fn new_address(id: i32, customer_id: i32, street: &str) -> address::ActiveModel {
    address::ActiveModel {
        id: Set(id),
        customer_id: Set(customer_id),
        street: Set(street.to_string()),
    }
}

/// Tag without an id; the database assigns one on insert.
pub fn new_tag(label: &str) -> tag::ActiveModel {
    tag::ActiveModel {
        id: NotSet,
        label: Set(label.to_string()),
    }
}
