mod error;
mod models;
mod repository;

pub use error::{RepositoryError, RepositoryResult};
pub use models::{
    CheckoutRecord, Invoice, InvoicePeriod, MasterAccount, PaymentMethod, PaymentOutcome,
    PaymentResult, Subscription, SubscriptionStatus, TempCardBundle, TransactionRecord, User,
    UserStatus,
};
pub use repository::{PersistTransaction, Repository};
