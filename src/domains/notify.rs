// 通知领域管理器

use std::sync::Arc;

use crate::mail::NotificationService;

#[derive(Clone)]
pub struct NotifyDomain {
    notifications: Arc<NotificationService>,
}

impl NotifyDomain {
    pub fn new(notifications: Arc<NotificationService>) -> Self {
        Self { notifications }
    }

    /// 获取通知服务
    pub fn get_notifications(&self) -> &Arc<NotificationService> {
        &self.notifications
    }
}
