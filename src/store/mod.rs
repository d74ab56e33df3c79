//! In-memory record store backing the HTTP surface.
//!
//! Seeded at startup and read-only afterwards; ids are 1-based and assigned
//! in insertion order.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: u64,
    pub user_id: u64,
    pub product_name: String,
}

#[derive(Debug, Default)]
pub struct Store {
    users: Vec<User>,
    orders: Vec<Order>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two users with two orders each.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        let john = store.insert_user("John Doe", "john@example.com");
        let jane = store.insert_user("Jane Smith", "jane@example.com");
        store.insert_order(john, "Product 1");
        store.insert_order(john, "Product 2");
        store.insert_order(jane, "Product 3");
        store.insert_order(jane, "Product 4");
        store
    }

    pub fn insert_user(&mut self, name: &str, email: &str) -> u64 {
        let id = self.users.len() as u64 + 1;
        self.users.push(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
        });
        id
    }

    pub fn insert_order(&mut self, user_id: u64, product_name: &str) -> u64 {
        let id = self.orders.len() as u64 + 1;
        self.orders.push(Order {
            id,
            user_id,
            product_name: product_name.to_string(),
        });
        id
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn user(&self, id: u64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn order(&self, id: u64) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_contents() {
        let store = Store::seeded();
        assert_eq!(store.users().len(), 2);
        assert_eq!(store.orders().len(), 4);
        assert_eq!(store.user(2).map(|u| u.name.as_str()), Some("Jane Smith"));
        assert_eq!(store.order(3).map(|o| o.user_id), Some(2));
        assert!(store.user(0).is_none());
        assert!(store.order(5).is_none());
    }
}
