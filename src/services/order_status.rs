use crate::entities::OrderStatus;
use crate::errors::ServiceError;
use sea_orm::Iterable;

/// Whether an order may move from `from` to `to`.
///
/// `pending -> {shipped, assigned, cancelled}`, `assigned -> {delivered, cancelled}`,
/// `shipped -> {delivered}`. `delivered` and `cancelled` are terminal.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    matches!(
        (from, to),
        (Pending, Shipped)
            | (Pending, Assigned)
            | (Pending, Cancelled)
            | (Assigned, Delivered)
            | (Assigned, Cancelled)
            | (Shipped, Delivered)
    )
}

pub fn is_terminal(status: OrderStatus) -> bool {
    allowed_transitions(status).is_empty()
}

/// Statuses an order in `from` may move to.
pub fn allowed_transitions(from: OrderStatus) -> Vec<OrderStatus> {
    OrderStatus::iter()
        .filter(|to| is_valid_transition(from, *to))
        .collect()
}

pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> Result<(), ServiceError> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Shipped, true)]
    #[case(OrderStatus::Pending, OrderStatus::Assigned, true)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Pending, OrderStatus::Delivered, false)]
    #[case(OrderStatus::Assigned, OrderStatus::Delivered, true)]
    #[case(OrderStatus::Assigned, OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Assigned, OrderStatus::Shipped, false)]
    #[case(OrderStatus::Shipped, OrderStatus::Delivered, true)]
    #[case(OrderStatus::Shipped, OrderStatus::Cancelled, false)]
    #[case(OrderStatus::Delivered, OrderStatus::Pending, false)]
    #[case(OrderStatus::Cancelled, OrderStatus::Pending, false)]
    #[case(OrderStatus::Pending, OrderStatus::Pending, false)]
    fn transition_table(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] ok: bool) {
        assert_eq!(is_valid_transition(from, to), ok);
    }

    #[test]
    fn terminal_states() {
        assert!(is_terminal(OrderStatus::Delivered));
        assert!(is_terminal(OrderStatus::Cancelled));
        assert!(!is_terminal(OrderStatus::Pending));
        assert!(!is_terminal(OrderStatus::Shipped));
    }

    #[test]
    fn rejected_transition_names_both_states() {
        let err = ensure_transition(OrderStatus::Delivered, OrderStatus::Pending).unwrap_err();
        assert_matches!(err, ServiceError::InvalidTransition { .. });
        assert_eq!(err.to_string(), "cannot move order from delivered to pending");
    }
}
