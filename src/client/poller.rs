//! Staff notification panel: a background task polls the unread count
//! every interval, and the full list while the panel is open.
//!
//! Snapshots go out on a `watch` channel. The task stops when `stop()`
//! is called or the poller is dropped, so nothing is published after
//! the owner goes away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::{ClientError, ClinicClient};
use crate::models::{Appointment, AppointmentNotification};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationSnapshot {
    pub unread_count: i64,
    /// Only kept fresh while the panel is open.
    pub notifications: Vec<AppointmentNotification>,
    pub panel_open: bool,
    /// Last poll failure; cleared by the next successful poll.
    pub last_error: Option<String>,
}

pub struct NotificationPoller {
    client: ClinicClient,
    open: Arc<AtomicBool>,
    state: Arc<watch::Sender<NotificationSnapshot>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl NotificationPoller {
    /// Start polling. The first poll runs immediately.
    pub fn spawn(client: ClinicClient, interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(NotificationSnapshot::default());
        let state = Arc::new(state_tx);
        let open = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = {
            let client = client.clone();
            let state = state.clone();
            let open = open.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        _ = ticker.tick() => {
                            if let Err(e) = poll_once(&client, open.load(Ordering::Relaxed), &state).await {
                                tracing::warn!(error = %e, "Notification poll failed");
                                state.send_modify(|s| s.last_error = Some(e.to_string()));
                            }
                        }
                    }
                }
                tracing::debug!("Notification poller stopped");
            })
        };

        Self {
            client,
            open,
            state,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.state.borrow().clone()
    }

    /// Open or close the panel. Opening fetches the list right away.
    pub async fn set_open(&self, open: bool) -> Result<(), ClientError> {
        self.open.store(open, Ordering::Relaxed);
        self.state.send_modify(|s| s.panel_open = open);
        if open {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Poll now instead of waiting for the next tick.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        poll_once(&self.client, self.open.load(Ordering::Relaxed), &self.state).await
    }

    pub async fn mark_read(&self, id: i64) -> Result<(), ClientError> {
        let updated = self.client.mark_notification_read(id).await?;
        self.state.send_modify(|s| {
            if let Some(n) = s.notifications.iter_mut().find(|n| n.id == id) {
                if !n.is_read {
                    s.unread_count = (s.unread_count - 1).max(0);
                }
                *n = updated;
            }
        });
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), ClientError> {
        self.client.mark_all_notifications_read().await?;
        self.state.send_modify(|s| {
            s.unread_count = 0;
            for n in &mut s.notifications {
                n.is_read = true;
            }
        });
        Ok(())
    }

    // Inline actions from the panel: act, mark the notification read,
    // then refresh. The first failure is returned and the rest skipped.

    pub async fn approve_reschedule(&self, appointment: i64, notification: i64) -> Result<Appointment, ClientError> {
        let updated = self.client.approve_reschedule(appointment).await?;
        self.mark_read(notification).await?;
        self.refresh().await?;
        Ok(updated)
    }

    pub async fn reject_reschedule(&self, appointment: i64, notification: i64) -> Result<Appointment, ClientError> {
        let updated = self.client.reject_reschedule(appointment).await?;
        self.mark_read(notification).await?;
        self.refresh().await?;
        Ok(updated)
    }

    pub async fn approve_cancel(&self, appointment: i64, notification: i64) -> Result<(), ClientError> {
        self.client.approve_cancel(appointment).await?;
        self.mark_read(notification).await?;
        self.refresh().await
    }

    pub async fn reject_cancel(&self, appointment: i64, notification: i64) -> Result<Appointment, ClientError> {
        let updated = self.client.reject_cancel(appointment).await?;
        self.mark_read(notification).await?;
        self.refresh().await?;
        Ok(updated)
    }

    /// Stop the background task and wait for it to finish.
    pub async fn stop(mut self) {
        self.signal_stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn signal_stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for NotificationPoller {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

async fn poll_once(
    client: &ClinicClient,
    open: bool,
    state: &watch::Sender<NotificationSnapshot>,
) -> Result<(), ClientError> {
    let unread_count = client.unread_count().await?;
    let notifications = if open {
        Some(client.notifications().await?)
    } else {
        None
    };
    state.send_modify(|s| {
        s.unread_count = unread_count;
        if let Some(list) = notifications {
            s.notifications = list;
        }
        s.last_error = None;
    });
    Ok(())
}

/// Short age label for the panel: "just now", "5m ago", "3h ago", "2d ago".
pub fn relative_time(created_at: NaiveDateTime, now: NaiveDateTime) -> String {
    let minutes = (now - created_at).num_minutes();
    match minutes {
        m if m < 1 => "just now".to_string(),
        m if m < 60 => format!("{m}m ago"),
        m if m < 60 * 24 => format!("{}h ago", m / 60),
        m => format!("{}d ago", m / (60 * 24)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use chrono::{NaiveDate, NaiveTime};

    use crate::api::server::start_server;
    use crate::config::ClientConfig;
    use crate::models::enums::{AppointmentStatus, NotificationType, UserType};
    use crate::models::{NewAppointment, RescheduleProposal};
    use crate::test_support::{seed_user, test_core};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn relative_time_buckets() {
        let now = ts("2025-01-20 12:00:00");
        assert_eq!(relative_time(ts("2025-01-20 11:59:30"), now), "just now");
        assert_eq!(relative_time(ts("2025-01-20 11:55:00"), now), "5m ago");
        assert_eq!(relative_time(ts("2025-01-20 09:00:00"), now), "3h ago");
        assert_eq!(relative_time(ts("2025-01-18 12:00:00"), now), "2d ago");
        // Clock skew never shows a negative age.
        assert_eq!(relative_time(ts("2025-01-20 12:05:00"), now), "just now");
    }

    async fn wait_for<F>(rx: &mut watch::Receiver<NotificationSnapshot>, mut done: F) -> NotificationSnapshot
    where
        F: FnMut(&NotificationSnapshot) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if done(&rx.borrow_and_update()) {
                    return rx.borrow().clone();
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("snapshot never matched")
    }

    #[tokio::test]
    async fn polls_and_resolves_inline() {
        let (core, _tmp) = test_core();
        let server = start_server(core.clone(), SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let config = ClientConfig::new(server.base_url()).with_poll_interval(Duration::from_millis(50));
        let (patient_user, patient_token) = seed_user(&core, "pat", UserType::Patient);
        let (_, staff_token) = seed_user(&core, "sara", UserType::Staff);
        let patient = ClinicClient::new(&config).unwrap().with_token(patient_token);
        let staff = ClinicClient::new(&config).unwrap().with_token(staff_token);

        let poller = NotificationPoller::spawn(staff.clone(), config.poll_interval);
        let mut rx = poller.subscribe();
        wait_for(&mut rx, |s| s.last_error.is_none() && s.unread_count == 0).await;

        let appt = staff
            .create_appointment(&NewAppointment {
                patient: Some(patient_user.id),
                date: NaiveDate::from_ymd_opt(2025, 1, 20),
                time: NaiveTime::from_hms_opt(10, 0, 0),
                ..Default::default()
            })
            .await
            .unwrap();
        let proposal = RescheduleProposal {
            date: NaiveDate::from_ymd_opt(2025, 1, 25),
            time: NaiveTime::from_hms_opt(14, 0, 0),
            ..Default::default()
        };
        patient.request_reschedule(appt.id, &proposal).await.unwrap();

        let snapshot = wait_for(&mut rx, |s| s.unread_count == 1).await;
        assert!(snapshot.notifications.is_empty(), "list is only fetched while open");

        poller.set_open(true).await.unwrap();
        let snapshot = poller.snapshot();
        assert!(snapshot.panel_open);
        let notification = &snapshot.notifications[0];
        assert_eq!(notification.notification_type, NotificationType::RescheduleRequest);
        assert_eq!(notification.appointment, Some(appt.id));

        let approved = poller.approve_reschedule(appt.id, notification.id).await.unwrap();
        assert_eq!(approved.status, AppointmentStatus::Confirmed);
        let snapshot = poller.snapshot();
        assert_eq!(snapshot.unread_count, 0);
        assert!(snapshot.notifications.iter().all(|n| n.is_read));

        // Acting twice fails fast: the notification is not touched again.
        let err = poller.approve_reschedule(appt.id, notification.id).await.unwrap_err();
        assert!(matches!(err, ClientError::Conflict(_)));

        poller.stop().await;
        server.stop().await;
    }

    #[tokio::test]
    async fn mark_all_read_clears_count() {
        let (core, _tmp) = test_core();
        let server = start_server(core.clone(), SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let config = ClientConfig::new(server.base_url());
        let (_, patient_token) = seed_user(&core, "pat", UserType::Patient);
        let (_, owner_token) = seed_user(&core, "olivia", UserType::Owner);
        let patient = ClinicClient::new(&config).unwrap().with_token(patient_token);
        let owner = ClinicClient::new(&config).unwrap().with_token(owner_token);

        for hour in [9, 10] {
            patient
                .create_appointment(&NewAppointment {
                    date: NaiveDate::from_ymd_opt(2030, 2, 1),
                    time: NaiveTime::from_hms_opt(hour, 0, 0),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        // Long interval: only explicit refreshes run after the first tick.
        let poller = NotificationPoller::spawn(owner, Duration::from_secs(3600));
        poller.set_open(true).await.unwrap();
        assert_eq!(poller.snapshot().unread_count, 2);
        assert_eq!(poller.snapshot().notifications.len(), 2);

        poller.mark_all_read().await.unwrap();
        assert_eq!(poller.snapshot().unread_count, 0);
        poller.refresh().await.unwrap();
        assert_eq!(poller.snapshot().unread_count, 0);

        poller.stop().await;
        server.stop().await;
    }

    #[tokio::test]
    async fn poll_errors_are_published() {
        let client = ClinicClient::new(&ClientConfig::new("http://127.0.0.1:9")).unwrap();
        let poller = NotificationPoller::spawn(client, Duration::from_millis(20));
        let mut rx = poller.subscribe();
        let snapshot = wait_for(&mut rx, |s| s.last_error.is_some()).await;
        assert_eq!(snapshot.unread_count, 0);
        poller.stop().await;
    }
}
