//! Persistent records: users, products, carts and orders.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{CartLine, Entity as Cart, Model as CartModel};
pub use order::{Entity as Order, Model as OrderModel, OrderLine, OrderStatus};
pub use product::{Entity as Product, Model as ProductModel};
pub use user::{Entity as User, Model as UserModel, UserRole};
