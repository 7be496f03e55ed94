//! Public purchases API: registers pending callbacks, forwards commands to the
//! native bridge and resolves callbacks from inbound completions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::Stream;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::bridge::noop::NoopBridge;
use crate::bridge::{DynBridge, InboundMessage, InboundSource};
use crate::command::{
    Command, CommandEnvelope, OperationKind, ProductType, ProrationMode, RequestId,
    SubscriberAttribute,
};
use crate::config::PurchasesConfig;
use crate::error::SdkError;
use crate::internal::decoder;
use crate::internal::registry::{Completion, CorrelationRegistry};
use crate::model::{
    IntroEligibility, Offerings, Package, Product, PurchaseFailure, PurchaseResult, PurchaserInfo,
};

/// Extra arguments for purchase commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchaseOptions {
    pub product_type: ProductType,
    /// Product being replaced when upgrading or downgrading.
    pub old_sku: Option<String>,
    pub proration_mode: ProrationMode,
}

impl PurchaseOptions {
    pub fn replacing(old_sku: impl Into<String>, proration_mode: ProrationMode) -> Self {
        Self {
            old_sku: Some(old_sku.into()),
            proration_mode,
            ..Default::default()
        }
    }
}

/// Entry point for application code.
///
/// Cloning is cheap; clones share the same bridge and pending callbacks.
pub struct Purchases {
    inner: Arc<PurchasesInner>,
}

impl Clone for Purchases {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PurchasesInner {
    config: PurchasesConfig,
    bridge: DynBridge,
    registry: CorrelationRegistry,
    updates: broadcast::Sender<PurchaserInfo>,
    pump: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Purchases {
    /// Create the SDK around a platform bridge. `None` selects [`NoopBridge`].
    pub fn new(config: PurchasesConfig, bridge: Option<DynBridge>) -> Self {
        let bridge = bridge.unwrap_or_else(|| Arc::new(NoopBridge) as DynBridge);
        let (updates, _) = broadcast::channel(config.update_buffer.max(1));
        let registry = CorrelationRegistry::new(config.correlation);

        Self {
            inner: Arc::new(PurchasesInner {
                config,
                bridge,
                registry,
                updates,
                pump: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &PurchasesConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Whether a callback is waiting for a completion of `kind`.
    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.inner.registry.is_pending(kind)
    }

    /// Send the setup commands derived from the configuration.
    ///
    /// Configured product identifiers are prefetched without a callback.
    pub fn configure(&self) -> Result<(), SdkError> {
        let config = &self.inner.config;

        if let Some(proxy_url) = config.effective_proxy_url() {
            self.send(Command::SetProxyUrl {
                proxy_url: proxy_url.to_string(),
            })?;
        }

        self.send(Command::Setup {
            api_key: config.api_key.clone(),
            app_user_id: config.effective_app_user_id().map(str::to_string),
            observer_mode: config.observer_mode,
            user_defaults_suite_name: config.user_defaults_suite_name.clone(),
        })?;

        if !config.product_identifiers.is_empty() {
            self.send(Command::GetProducts {
                product_identifiers: config.product_identifiers.clone(),
                product_type: config.product_type,
            })?;
        }

        log::info!("purchases configured: {config:?}");
        Ok(())
    }

    /// Drain `source` on a background task, resolving callbacks as messages arrive.
    ///
    /// Must be called from within a tokio runtime. Calling it again while the
    /// task is running has no effect. The task only holds a weak handle and is
    /// aborted once the last [`Purchases`] clone is dropped.
    pub fn start<S>(&self, source: Arc<S>) -> Result<(), SdkError>
    where
        S: InboundSource + ?Sized + 'static,
    {
        self.ensure_open()?;

        let mut pump = self.lock_pump();
        if pump.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let inner = Arc::downgrade(&self.inner);
        *pump = Some(tokio::spawn(run_pump(inner, source)));
        Ok(())
    }

    /// Route one inbound message.
    pub fn handle_inbound(&self, message: InboundMessage) {
        match message {
            InboundMessage::Completion { kind, payload } => self.deliver(kind, &payload),
            InboundMessage::PurchaserInfoUpdated { payload } => {
                self.deliver_purchaser_info_update(&payload)
            }
        }
    }

    /// Resolve the pending callback for `kind` with a completion payload.
    ///
    /// A completion nobody is waiting for is dropped.
    pub fn deliver(&self, kind: OperationKind, payload: &str) {
        log::debug!("[deliver] {kind} {payload}");

        let parsed = decoder::parse_inbound(payload);
        let request_id = parsed.as_ref().ok().and_then(decoder::request_id);

        match self.inner.registry.take_and_clear(kind, request_id) {
            Some(callback) => callback(parsed),
            None => log::debug!("[deliver] no pending {kind} request matches {request_id:?}"),
        }
    }

    /// Publish purchaser info pushed by the native layer to update subscribers.
    pub fn deliver_purchaser_info_update(&self, payload: &str) {
        log::debug!("[deliver] purchaser info update {payload}");

        let parsed = match decoder::parse_inbound(payload) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("discarding purchaser info update: {err}");
                return;
            }
        };

        if parsed.get("purchaserInfo").map_or(true, Value::is_null) {
            return;
        }

        match decoder::decode_purchaser_info(&parsed) {
            Ok(info) => {
                let _ = self.inner.updates.send(info);
            }
            Err(err) => log::warn!("discarding purchaser info update: {err}"),
        }
    }

    /// Stream of purchaser info updates pushed after subscribing.
    ///
    /// Updates missed by a slow subscriber are skipped.
    pub fn purchaser_info_updates(&self) -> impl Stream<Item = PurchaserInfo> + Send + 'static {
        BroadcastStream::new(self.inner.updates.subscribe()).filter_map(|update| update.ok())
    }

    /// Stop the inbound task and fail every pending callback with [`SdkError::Closed`].
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.lock_pump().take() {
            handle.abort();
        }

        for (kind, callback) in self.inner.registry.drain() {
            log::debug!("[close] failing pending {kind} request");
            callback(Err(SdkError::Closed));
        }
    }

    pub fn get_products_with<F>(
        &self,
        product_identifiers: impl IntoIterator<Item = impl Into<String>>,
        product_type: ProductType,
        callback: F,
    ) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<Vec<Product>, SdkError>) + Send + 'static,
    {
        let command = Command::GetProducts {
            product_identifiers: product_identifiers.into_iter().map(Into::into).collect(),
            product_type,
        };
        self.dispatch_decoded(command, decoder::decode_products, callback)
    }

    pub async fn get_products(
        &self,
        product_identifiers: impl IntoIterator<Item = impl Into<String>>,
        product_type: ProductType,
    ) -> Result<Vec<Product>, SdkError> {
        let (tx, rx) = oneshot::channel();
        self.get_products_with(product_identifiers, product_type, move |result| {
            let _ = tx.send(result);
        })?;
        await_completion(OperationKind::Products, rx).await
    }

    pub fn purchase_product_with<F>(
        &self,
        product_identifier: impl Into<String>,
        options: PurchaseOptions,
        callback: F,
    ) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<PurchaseResult, PurchaseFailure>) + Send + 'static,
    {
        let command = Command::PurchaseProduct {
            product_identifier: non_empty(product_identifier, "product identifier")?,
            product_type: options.product_type,
            old_sku: options.old_sku,
            proration_mode: options.proration_mode,
        };
        self.dispatch_purchase(command, callback)
    }

    pub async fn purchase_product(
        &self,
        product_identifier: impl Into<String>,
        options: PurchaseOptions,
    ) -> Result<PurchaseResult, PurchaseFailure> {
        let (tx, rx) = oneshot::channel();
        self.purchase_product_with(product_identifier, options, move |result| {
            let _ = tx.send(result);
        })?;
        await_purchase(rx).await
    }

    /// Purchase a package; only the old SKU and proration mode of `options` apply.
    pub fn purchase_package_with<F>(
        &self,
        package: &Package,
        options: PurchaseOptions,
        callback: F,
    ) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<PurchaseResult, PurchaseFailure>) + Send + 'static,
    {
        let command = Command::PurchasePackage {
            package_identifier: non_empty(package.identifier.as_str(), "package identifier")?,
            offering_identifier: package.offering_identifier.clone(),
            old_sku: options.old_sku,
            proration_mode: options.proration_mode,
        };
        self.dispatch_purchase(command, callback)
    }

    pub async fn purchase_package(
        &self,
        package: &Package,
        options: PurchaseOptions,
    ) -> Result<PurchaseResult, PurchaseFailure> {
        let (tx, rx) = oneshot::channel();
        self.purchase_package_with(package, options, move |result| {
            let _ = tx.send(result);
        })?;
        await_purchase(rx).await
    }

    pub fn restore_transactions_with<F>(&self, callback: F) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<PurchaserInfo, SdkError>) + Send + 'static,
    {
        self.dispatch_decoded(
            Command::RestoreTransactions,
            decoder::decode_purchaser_info,
            callback,
        )
    }

    pub async fn restore_transactions(&self) -> Result<PurchaserInfo, SdkError> {
        let (tx, rx) = oneshot::channel();
        self.restore_transactions_with(move |result| {
            let _ = tx.send(result);
        })?;
        await_completion(OperationKind::Restore, rx).await
    }

    pub fn create_alias_with<F>(
        &self,
        new_app_user_id: impl Into<String>,
        callback: F,
    ) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<PurchaserInfo, SdkError>) + Send + 'static,
    {
        let command = Command::CreateAlias {
            new_app_user_id: non_empty(new_app_user_id, "app user id")?,
        };
        self.dispatch_decoded(command, decoder::decode_purchaser_info, callback)
    }

    pub async fn create_alias(
        &self,
        new_app_user_id: impl Into<String>,
    ) -> Result<PurchaserInfo, SdkError> {
        let (tx, rx) = oneshot::channel();
        self.create_alias_with(new_app_user_id, move |result| {
            let _ = tx.send(result);
        })?;
        await_completion(OperationKind::CreateAlias, rx).await
    }

    pub fn identify_with<F>(
        &self,
        app_user_id: impl Into<String>,
        callback: F,
    ) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<PurchaserInfo, SdkError>) + Send + 'static,
    {
        let command = Command::Identify {
            app_user_id: non_empty(app_user_id, "app user id")?,
        };
        self.dispatch_decoded(command, decoder::decode_purchaser_info, callback)
    }

    pub async fn identify(&self, app_user_id: impl Into<String>) -> Result<PurchaserInfo, SdkError> {
        let (tx, rx) = oneshot::channel();
        self.identify_with(app_user_id, move |result| {
            let _ = tx.send(result);
        })?;
        await_completion(OperationKind::Identify, rx).await
    }

    pub fn reset_with<F>(&self, callback: F) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<PurchaserInfo, SdkError>) + Send + 'static,
    {
        self.dispatch_decoded(Command::Reset, decoder::decode_purchaser_info, callback)
    }

    pub async fn reset(&self) -> Result<PurchaserInfo, SdkError> {
        let (tx, rx) = oneshot::channel();
        self.reset_with(move |result| {
            let _ = tx.send(result);
        })?;
        await_completion(OperationKind::Reset, rx).await
    }

    pub fn get_purchaser_info_with<F>(&self, callback: F) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<PurchaserInfo, SdkError>) + Send + 'static,
    {
        self.dispatch_decoded(
            Command::GetPurchaserInfo,
            decoder::decode_purchaser_info,
            callback,
        )
    }

    pub async fn get_purchaser_info(&self) -> Result<PurchaserInfo, SdkError> {
        let (tx, rx) = oneshot::channel();
        self.get_purchaser_info_with(move |result| {
            let _ = tx.send(result);
        })?;
        await_completion(OperationKind::PurchaserInfo, rx).await
    }

    pub fn get_offerings_with<F>(&self, callback: F) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<Offerings, SdkError>) + Send + 'static,
    {
        self.dispatch_decoded(Command::GetOfferings, decoder::decode_offerings, callback)
    }

    pub async fn get_offerings(&self) -> Result<Offerings, SdkError> {
        let (tx, rx) = oneshot::channel();
        self.get_offerings_with(move |result| {
            let _ = tx.send(result);
        })?;
        await_completion(OperationKind::Offerings, rx).await
    }

    pub fn check_trial_or_introductory_price_eligibility_with<F>(
        &self,
        product_identifiers: impl IntoIterator<Item = impl Into<String>>,
        callback: F,
    ) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<HashMap<String, IntroEligibility>, SdkError>) + Send + 'static,
    {
        let command = Command::CheckTrialOrIntroductoryPriceEligibility {
            product_identifiers: product_identifiers.into_iter().map(Into::into).collect(),
        };
        self.dispatch_decoded(command, decoder::decode_eligibility, callback)
    }

    pub async fn check_trial_or_introductory_price_eligibility(
        &self,
        product_identifiers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<HashMap<String, IntroEligibility>, SdkError> {
        let (tx, rx) = oneshot::channel();
        self.check_trial_or_introductory_price_eligibility_with(product_identifiers, move |result| {
            let _ = tx.send(result);
        })?;
        await_completion(OperationKind::TrialEligibility, rx).await
    }

    pub fn sync_purchases(&self) -> Result<(), SdkError> {
        self.send(Command::SyncPurchases)
    }

    pub fn invalidate_purchaser_info_cache(&self) -> Result<(), SdkError> {
        self.send(Command::InvalidatePurchaserInfoCache)
    }

    pub fn present_code_redemption_sheet(&self) -> Result<(), SdkError> {
        self.send(Command::PresentCodeRedemptionSheet)
    }

    pub fn collect_device_identifiers(&self) -> Result<(), SdkError> {
        self.send(Command::CollectDeviceIdentifiers)
    }

    pub fn set_finish_transactions(&self, finish_transactions: bool) -> Result<(), SdkError> {
        self.send(Command::SetFinishTransactions {
            finish_transactions,
        })
    }

    pub fn set_allow_sharing_store_account(&self, allow: bool) -> Result<(), SdkError> {
        self.send(Command::SetAllowSharingStoreAccount { allow })
    }

    pub fn set_debug_logs_enabled(&self, enabled: bool) -> Result<(), SdkError> {
        self.send(Command::SetDebugLogsEnabled { enabled })
    }

    pub fn set_simulates_ask_to_buy_in_sandbox(&self, enabled: bool) -> Result<(), SdkError> {
        self.send(Command::SetSimulatesAskToBuyInSandbox { enabled })
    }

    pub fn set_automatic_apple_search_ads_attribution_collection(
        &self,
        enabled: bool,
    ) -> Result<(), SdkError> {
        self.send(Command::SetAutomaticAppleSearchAdsAttributionCollection { enabled })
    }

    /// Set custom subscriber attributes; `None` values delete the attribute.
    pub fn set_attributes(&self, attributes: HashMap<String, Option<String>>) -> Result<(), SdkError> {
        let attributes: Map<String, Value> = attributes
            .into_iter()
            .map(|(key, value)| (key, value.map_or(Value::Null, Value::String)))
            .collect();
        self.send(Command::SetAttributes { attributes })
    }

    /// Set a reserved subscriber attribute; `None` or an empty value deletes it.
    pub fn set_subscriber_attribute(
        &self,
        attribute: SubscriberAttribute,
        value: Option<&str>,
    ) -> Result<(), SdkError> {
        let value = value.filter(|value| !value.is_empty()).map(str::to_string);
        self.send(Command::SetSubscriberAttribute { attribute, value })
    }

    pub fn app_user_id(&self) -> Option<String> {
        self.inner.bridge.app_user_id()
    }

    pub fn is_anonymous(&self) -> bool {
        self.inner.bridge.is_anonymous()
    }

    fn dispatch_decoded<T, F>(
        &self,
        command: Command,
        decode: fn(&Value) -> Result<T, SdkError>,
        callback: F,
    ) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<T, SdkError>) + Send + 'static,
        T: 'static,
    {
        self.dispatch(
            command,
            Box::new(move |raw: Result<Value, SdkError>| {
                callback(raw.and_then(|value| decode(&value)))
            }),
        )
    }

    fn dispatch_purchase<F>(&self, command: Command, callback: F) -> Result<RequestId, SdkError>
    where
        F: FnOnce(Result<PurchaseResult, PurchaseFailure>) + Send + 'static,
    {
        self.dispatch(
            command,
            Box::new(move |raw: Result<Value, SdkError>| {
                callback(
                    raw.map_err(PurchaseFailure::from)
                        .and_then(|value| decoder::decode_purchase(&value)),
                )
            }),
        )
    }

    /// Reserve `completion` under the command's kind, then hand the command to
    /// the bridge. Only a sent command displaces the callback pending before it;
    /// a rejected send forgets the reservation and leaves that callback alone.
    fn dispatch(&self, command: Command, completion: Completion) -> Result<RequestId, SdkError> {
        self.ensure_open()?;

        let kind = command.kind().ok_or_else(|| {
            SdkError::Message(format!("{command:?} does not expect a completion"))
        })?;
        let registry = &self.inner.registry;
        let request_id = registry.reserve(kind, completion);
        let envelope = CommandEnvelope::correlated(request_id, command);
        log::debug!("[dispatch] {kind} {request_id}");

        if let Err(err) = self.inner.bridge.send(&envelope) {
            registry.cancel(kind, request_id);
            return Err(err);
        }
        registry.commit(kind, request_id);
        Ok(request_id)
    }

    fn send(&self, command: Command) -> Result<(), SdkError> {
        self.ensure_open()?;
        log::debug!("[send] {command:?}");
        self.inner
            .bridge
            .send(&CommandEnvelope::uncorrelated(command))
    }

    fn ensure_open(&self) -> Result<(), SdkError> {
        if self.is_closed() {
            return Err(SdkError::Closed);
        }
        Ok(())
    }

    fn lock_pump(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.pump.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PurchasesInner {
    fn drop(&mut self) {
        let pump = self.pump.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pump.take() {
            handle.abort();
        }
    }
}

async fn run_pump<S>(inner: Weak<PurchasesInner>, source: Arc<S>)
where
    S: InboundSource + ?Sized,
{
    while let Some(message) = source.next_message().await {
        let Some(strong) = inner.upgrade() else {
            break;
        };
        let purchases = Purchases { inner: strong };
        if purchases.is_closed() {
            break;
        }
        purchases.handle_inbound(message);
    }
    log::debug!("[pump] inbound source finished");
}

impl std::fmt::Debug for Purchases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Purchases")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn non_empty(value: impl Into<String>, what: &str) -> Result<String, SdkError> {
    let value = value.into();
    if value.trim().is_empty() {
        return Err(SdkError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(value)
}

async fn await_completion<T>(
    kind: OperationKind,
    receiver: oneshot::Receiver<Result<T, SdkError>>,
) -> Result<T, SdkError> {
    receiver
        .await
        .unwrap_or_else(|_| Err(SdkError::Superseded(kind)))
}

async fn await_purchase(
    receiver: oneshot::Receiver<Result<PurchaseResult, PurchaseFailure>>,
) -> Result<PurchaseResult, PurchaseFailure> {
    receiver
        .await
        .unwrap_or_else(|_| Err(SdkError::Superseded(OperationKind::Purchase).into()))
}
