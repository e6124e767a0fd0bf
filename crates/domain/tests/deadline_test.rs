use ferrous_query_domain::{compute_times, Deadline};
use std::time::{Duration, Instant};

#[test]
fn test_no_timeout_means_no_deadline() {
    let (_, deadline) = compute_times(None);

    assert_eq!(deadline, Deadline::none());
    assert!(deadline.expiration().is_none());
    assert!(deadline.remaining().is_none());
    assert!(!deadline.is_expired());
}

#[test]
fn test_expiration_is_start_plus_timeout() {
    let timeout = Duration::from_secs(2);
    let (start, deadline) = compute_times(Some(timeout));

    assert_eq!(deadline.expiration(), Some(start + timeout));
}

#[test]
fn test_remaining_shrinks_with_time() {
    let start = Instant::now();
    let deadline = Deadline::after(start, Some(Duration::from_secs(10)));

    let later = start + Duration::from_secs(4);
    assert_eq!(deadline.remaining_at(later), Some(Duration::from_secs(6)));
}

#[test]
fn test_remaining_floors_at_zero() {
    let start = Instant::now();
    let deadline = Deadline::after(start, Some(Duration::from_millis(100)));

    let past_expiration = start + Duration::from_secs(5);
    assert_eq!(deadline.remaining_at(past_expiration), Some(Duration::ZERO));
}

#[test]
fn test_zero_timeout_is_expired_immediately() {
    let (_, deadline) = compute_times(Some(Duration::ZERO));

    assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    assert!(deadline.is_expired());
}
