//! Attribute reads, from a single value up to the full meter readout

use super::Session;
use crate::objects::{profile_generic, CaptureColumn, CosemObject, ObjectCatalog, ReadTarget};
use crate::protocol::ProtocolClient;
use crate::reply::ReplyData;
use crate::trace::TraceLevel;
use chrono::{DateTime, Local};
use dlms_core::{DataObject, DataType, DlmsError, DlmsResult, ObisCode};
use dlms_transport::Media;

/// Rows of a profile generic buffer
pub type Rows = Vec<Vec<DataObject>>;

fn into_rows(buffer: DataObject) -> Rows {
    match buffer {
        DataObject::Null => Vec::new(),
        DataObject::Array(rows) => rows.into_iter().map(DataObject::into_elements).collect(),
        other => vec![other.into_elements()],
    }
}

/// Failures after which batched reads are no longer attempted
fn disables_batched_reads(error: &DlmsError) -> bool {
    matches!(
        error,
        DlmsError::Protocol(_) | DlmsError::CountMismatch { .. } | DlmsError::InvalidData(_)
    )
}

/// Local midnight of the day of `now`
fn start_of_day(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .unwrap_or(now)
}

impl<C, M> Session<C, M>
where
    C: ProtocolClient,
    M: Media,
{
    /// Read one attribute and store it on `object`
    pub async fn read(&mut self, object: &mut CosemObject, index: u8) -> DlmsResult<DataObject> {
        let request = self.client.read_request(object, index)?;
        let mut reply = ReplyData::new();
        self.read_data_block(&request, &mut reply).await?;
        if object.data_type(index) == DataType::None {
            object.set_data_type(index, reply.value_type);
        }
        let value = reply.value.take().unwrap_or(DataObject::Null);
        self.client.update_value(object, index, value)
    }

    /// Read several attributes, batched when the meter allows it
    ///
    /// A batched read the meter rejects fails this call and disables batching
    /// for the rest of the session, so later calls read the targets one by one.
    ///
    /// # Errors
    /// `CountMismatch` when the meter returns a different number of values
    /// than targets were requested.
    pub async fn read_list(&mut self, targets: &mut [ReadTarget<'_>]) -> DlmsResult<()> {
        if targets.is_empty() {
            return Ok(());
        }
        if self.multiple_references {
            let result = self.read_list_batched(targets).await;
            if let Err(e) = &result {
                if disables_batched_reads(e) {
                    log::warn!("Batched read failed, batching disabled: {}", e);
                    self.multiple_references = false;
                }
            }
            return result;
        }
        for target in targets.iter_mut() {
            self.read(&mut *target.object, target.index).await?;
        }
        Ok(())
    }

    async fn read_list_batched(&mut self, targets: &mut [ReadTarget<'_>]) -> DlmsResult<()> {
        let requests = {
            let refs: Vec<(&CosemObject, u8)> =
                targets.iter().map(|t| (&*t.object, t.index)).collect();
            self.client.read_list_request(&refs)?
        };
        let mut reply = ReplyData::new();
        let mut values = Vec::with_capacity(targets.len());
        for request in &requests {
            self.read_data_block(request, &mut reply).await?;
            values.extend(reply.take_values());
            reply.clear();
        }
        if values.len() != targets.len() {
            return Err(DlmsError::CountMismatch {
                expected: targets.len(),
                actual: values.len(),
            });
        }
        self.client.update_values(targets, values)
    }

    /// Write the cached value of attribute `index`
    pub async fn write(&mut self, object: &CosemObject, index: u8) -> DlmsResult<()> {
        let request = self.client.write_request(object, index)?;
        let mut reply = ReplyData::new();
        self.exchange_request(&request, &mut reply).await
    }

    /// Entry count and capture columns of a profile generic
    pub async fn read_columns(&mut self, profile: &mut CosemObject) -> DlmsResult<Vec<CaptureColumn>> {
        let entries = self.read(profile, profile_generic::ENTRIES_IN_USE).await?;
        self.tracer.write(
            &format!(
                "Reading Profile Generic: {} {} entries: {}",
                profile.logical_name(),
                profile.description(),
                entries
            ),
            TraceLevel::Info,
        );
        self.read(profile, profile_generic::CAPTURE_OBJECTS).await?;
        Ok(profile.capture_objects().to_vec())
    }

    /// `count` rows starting at 1-based entry `index`
    pub async fn read_rows_by_entry(
        &mut self,
        profile: &mut CosemObject,
        index: u32,
        count: u32,
    ) -> DlmsResult<Rows> {
        let request = self.client.read_rows_by_entry_request(profile, index, count)?;
        self.read_buffer(profile, &request).await
    }

    /// Rows captured between `start` and `end`
    pub async fn read_rows_by_range(
        &mut self,
        profile: &mut CosemObject,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> DlmsResult<Rows> {
        let request = self.client.read_rows_by_range_request(profile, start, end)?;
        self.read_buffer(profile, &request).await
    }

    async fn read_buffer(
        &mut self,
        profile: &mut CosemObject,
        request: &crate::protocol::Request,
    ) -> DlmsResult<Rows> {
        let mut reply = ReplyData::new();
        self.read_data_block(request, &mut reply).await?;
        let value = reply.value.take().unwrap_or(DataObject::Null);
        let buffer = self
            .client
            .update_value(profile, profile_generic::BUFFER, value)?;
        Ok(into_rows(buffer))
    }

    /// Object list of the current association
    pub async fn read_association_view(&mut self) -> DlmsResult<()> {
        self.tracer.write("Reading association view", TraceLevel::Info);
        let request = self.client.objects_request()?;
        let mut reply = ReplyData::new();
        self.read_data_block(&request, &mut reply).await?;
        self.objects = self.client.parse_objects(&reply.data, true)?;
        log::debug!("Association view holds {} objects", self.objects.len());
        Ok(())
    }

    /// Scalers and units of every register-like object
    pub async fn read_scalers_and_units(&mut self) -> DlmsResult<()> {
        let mut objects = std::mem::take(&mut self.objects);
        let result = self.scalers_pass(&mut objects).await;
        self.objects = objects;
        result
    }

    async fn scalers_pass(&mut self, objects: &mut ObjectCatalog) -> DlmsResult<()> {
        if self.multiple_references {
            let mut targets: Vec<ReadTarget<'_>> = objects
                .iter_mut()
                .filter_map(|o| {
                    let index = o.object_type().scaler_unit_index()?;
                    Some(ReadTarget::new(o, index))
                })
                .collect();
            if !targets.is_empty() {
                match self.read_list_batched(&mut targets).await {
                    Ok(()) => return Ok(()),
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        log::warn!("Batched scaler read failed, reading one by one: {}", e);
                        self.multiple_references = false;
                    }
                }
            }
        }

        for object in objects.iter_mut() {
            let Some(index) = object.object_type().scaler_unit_index() else {
                continue;
            };
            self.check_cancelled()?;
            if let Err(e) = self.read(object, index).await {
                if e.is_cancelled() {
                    return Err(e);
                }
                log::debug!("Scaler of {} not read: {}", object.logical_name(), e);
            }
        }
        Ok(())
    }

    /// Capture columns of every profile generic
    pub async fn read_profile_generic_columns(&mut self) -> DlmsResult<()> {
        let mut objects = std::mem::take(&mut self.objects);
        let result = self.columns_pass(&mut objects).await;
        self.objects = objects;
        result
    }

    async fn columns_pass(&mut self, objects: &mut ObjectCatalog) -> DlmsResult<()> {
        for profile in objects
            .iter_mut()
            .filter(|o| o.object_type().is_profile_generic())
        {
            self.check_cancelled()?;
            self.tracer.write(
                &format!("Profile Generic {} Columns:", profile.logical_name()),
                TraceLevel::Info,
            );
            match self.read(profile, profile_generic::CAPTURE_OBJECTS).await {
                Ok(_) => {
                    if self.tracer.enabled(TraceLevel::Info) {
                        let columns = profile
                            .capture_objects()
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(" | ");
                        self.tracer.write(&columns, TraceLevel::Info);
                    }
                }
                Err(e) => self.report_failure("Err! Failed to read columns: ", e)?,
            }
        }
        Ok(())
    }

    /// Every readable attribute of every object except profile generics
    pub async fn read_values(&mut self) -> DlmsResult<()> {
        let mut objects = std::mem::take(&mut self.objects);
        let result = self.values_pass(&mut objects).await;
        self.objects = objects;
        result
    }

    async fn values_pass(&mut self, objects: &mut ObjectCatalog) -> DlmsResult<()> {
        for object in objects.iter_mut() {
            self.check_cancelled()?;
            let object_type = object.object_type();
            if object_type.is_unknown() {
                self.tracer.write(
                    &format!("Unknown Interface: {} {}", object_type, object.logical_name()),
                    TraceLevel::Info,
                );
                continue;
            }
            if object_type.is_profile_generic() {
                continue;
            }
            self.tracer.write(
                &format!(
                    "-------- Reading {} {} {}",
                    object_type,
                    object.logical_name(),
                    object.description()
                ),
                TraceLevel::Info,
            );
            for index in object.attributes_to_read(true) {
                match self.read(object, index).await {
                    Ok(value) => self.show_value(index, &value),
                    Err(e) => self.report_failure(&format!("Error! Index: {} ", index), e)?,
                }
            }
        }
        Ok(())
    }

    /// Last row and today's rows of every profile generic in use
    pub async fn read_profile_generics(&mut self) -> DlmsResult<()> {
        let mut objects = std::mem::take(&mut self.objects);
        let result = self.history_pass(&mut objects).await;
        self.objects = objects;
        result
    }

    async fn history_pass(&mut self, objects: &mut ObjectCatalog) -> DlmsResult<()> {
        for profile in objects
            .iter_mut()
            .filter(|o| o.object_type().is_profile_generic())
        {
            self.check_cancelled()?;
            self.tracer.write(
                &format!(
                    "-------- Reading {} {} {}",
                    profile.object_type(),
                    profile.logical_name(),
                    profile.description()
                ),
                TraceLevel::Info,
            );

            let entries_in_use = match self.read(profile, profile_generic::ENTRIES_IN_USE).await {
                Ok(value) => value,
                Err(e) => {
                    self.report_failure("Error! Failed to read entries in use: ", e)?;
                    continue;
                }
            };
            let entries = match self.read(profile, profile_generic::PROFILE_ENTRIES).await {
                Ok(value) => value,
                Err(e) => {
                    self.report_failure("Error! Failed to read profile entries: ", e)?;
                    continue;
                }
            };
            self.tracer.write(
                &format!("Entries: {}/{}", entries_in_use, entries),
                TraceLevel::Info,
            );

            let in_use = entries_in_use.as_u64().unwrap_or(0);
            if in_use == 0 || profile.capture_objects().is_empty() {
                continue;
            }

            let last = u32::try_from(in_use).unwrap_or(u32::MAX);
            match self.read_rows_by_entry(profile, last, 1).await {
                Ok(rows) => self.show_rows(&rows),
                Err(e) => self.report_failure("Error! Failed to read last row: ", e)?,
            }

            let end = Local::now();
            match self.read_rows_by_range(profile, start_of_day(end), end).await {
                Ok(rows) => self.show_rows(&rows),
                Err(e) => self.report_failure("Error! Failed to read last day: ", e)?,
            }
        }
        Ok(())
    }

    /// Read attribute `index` of the catalog object named `logical_name`
    pub async fn read_by_name(&mut self, logical_name: &ObisCode, index: u8) -> DlmsResult<DataObject> {
        let mut objects = std::mem::take(&mut self.objects);
        let result = match objects.find_by_ln_mut(logical_name) {
            Some(object) => self.read(object, index).await,
            None => Err(DlmsError::InvalidData(format!(
                "Unknown logical name {}",
                logical_name
            ))),
        };
        self.objects = objects;
        result
    }

    /// Open, read the whole meter and close
    ///
    /// Failures of single objects are traced and skipped. The session is
    /// closed whatever happened; a close failure is only returned when
    /// nothing failed before it.
    pub async fn read_all(&mut self) -> DlmsResult<()> {
        let result = self.read_all_passes().await;
        self.finish(result).await
    }

    async fn read_all_passes(&mut self) -> DlmsResult<()> {
        self.open().await?;
        self.check_cancelled()?;
        self.read_association_view().await?;
        self.check_cancelled()?;
        self.read_scalers_and_units().await?;
        self.check_cancelled()?;
        self.read_profile_generic_columns().await?;
        self.check_cancelled()?;
        self.read_values().await?;
        self.check_cancelled()?;
        self.read_profile_generics().await
    }

    /// Open, read the given attributes in order and close
    pub async fn read_selected(&mut self, targets: &[(ObisCode, u8)]) -> DlmsResult<Vec<DataObject>> {
        let result = self.read_selected_inner(targets).await;
        match result {
            Ok(values) => self.finish(Ok(())).await.map(|()| values),
            Err(e) => self.finish(Err(e)).await.map(|()| Vec::new()),
        }
    }

    async fn read_selected_inner(&mut self, targets: &[(ObisCode, u8)]) -> DlmsResult<Vec<DataObject>> {
        self.open().await?;
        self.read_association_view().await?;
        let mut values = Vec::with_capacity(targets.len());
        for (logical_name, index) in targets {
            self.check_cancelled()?;
            let value = self.read_by_name(logical_name, *index).await?;
            self.show_value(*index, &value);
            values.push(value);
        }
        Ok(values)
    }

    async fn finish(&mut self, result: DlmsResult<()>) -> DlmsResult<()> {
        let closed = self.close().await;
        match (result, closed) {
            (Err(e), Err(close_error)) => {
                log::warn!("Close failed after an earlier error: {}", close_error);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), closed) => closed,
        }
    }

    /// Trace a read value at Info
    ///
    /// Byte strings are written as hex and arrays are joined with `, `.
    pub fn show_value(&self, index: u8, value: &DataObject) {
        self.tracer
            .write(&format!("Index: {} Value: {}", index, value), TraceLevel::Info);
    }

    fn show_rows(&self, rows: &Rows) {
        if !self.tracer.enabled(TraceLevel::Info) {
            return;
        }
        for row in rows {
            let line = row
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" | ");
            self.tracer.write(&line, TraceLevel::Info);
        }
    }

    /// Trace a per-object failure; only cancellation ends the pass
    fn report_failure(&self, context: &str, error: DlmsError) -> DlmsResult<()> {
        if error.is_cancelled() {
            return Err(error);
        }
        self.tracer
            .write(&format!("{}{}", context, error), TraceLevel::Error);
        if !error.is_protocol_or_timeout() {
            self.tracer.diagnostic(&error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionBuilder;
    use crate::objects::ObjectType;
    use crate::protocol::Conformance;
    use crate::testing::{
        capture_frame, frame, MemorySink, MockMedia, ScriptedClient, DISCONNECT, OBJECTS,
        READ_LIST,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn register(c: u8) -> CosemObject {
        CosemObject::new(ObjectType::Register, ObisCode::new(1, 0, c, 8, 0, 255))
    }

    fn data(c: u8) -> CosemObject {
        CosemObject::new(ObjectType::Data, ObisCode::new(0, 0, c, 0, 0, 255))
    }

    fn profile() -> CosemObject {
        CosemObject::new(ObjectType::ProfileGeneric, ObisCode::new(1, 0, 99, 1, 0, 255))
    }

    fn build(client: ScriptedClient, media: MockMedia, sink: &MemorySink) -> Session<ScriptedClient, MockMedia> {
        SessionBuilder::new()
            .wait_time(Duration::from_millis(10))
            .sink(Arc::new(sink.clone()))
            .build(client, media)
    }

    fn batched_client() -> ScriptedClient {
        let mut client = ScriptedClient::wrapper();
        client.conformance = Conformance::GET | Conformance::MULTIPLE_REFERENCES;
        client
    }

    #[test]
    fn test_into_rows() {
        let buffer = DataObject::Array(vec![
            DataObject::Structure(vec![DataObject::Unsigned8(1), DataObject::Unsigned8(2)]),
            DataObject::Structure(vec![DataObject::Unsigned8(3), DataObject::Unsigned8(4)]),
        ]);
        let rows = into_rows(buffer);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![DataObject::Unsigned8(3), DataObject::Unsigned8(4)]);
        assert!(into_rows(DataObject::Null).is_empty());
    }

    #[test]
    fn test_start_of_day() {
        let now = Local::now();
        let midnight = start_of_day(now);
        assert!(midnight <= now);
        assert_eq!(midnight.date_naive(), now.date_naive());
    }

    #[tokio::test]
    async fn test_read_adopts_type_and_is_repeatable() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[42]));
        media.push_reply(frame(0x01, &[42]));
        let sink = MemorySink::default();
        let mut session = build(ScriptedClient::hdlc(), media, &sink);
        let mut object = register(1);

        let first = session.read(&mut object, 2).await.unwrap();
        assert_eq!(object.data_type(2), DataType::Unsigned);
        let second = session.read(&mut object, 2).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(object.value(2), Some(&DataObject::Unsigned8(42)));
    }

    #[tokio::test]
    async fn test_read_keeps_declared_type() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[42]));
        let sink = MemorySink::default();
        let mut session = build(ScriptedClient::hdlc(), media, &sink);
        let mut object = register(1);
        object.set_data_type(2, DataType::DoubleLongUnsigned);
        session.read(&mut object, 2).await.unwrap();
        assert_eq!(object.data_type(2), DataType::DoubleLongUnsigned);
    }

    #[tokio::test]
    async fn test_read_list_batched() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x06, &[5, 6]));
        let sink = MemorySink::default();
        let mut session = build(batched_client(), media, &sink);
        session.multiple_references = true;

        let (mut a, mut b) = (register(1), register(2));
        let mut targets = vec![ReadTarget::new(&mut a, 2), ReadTarget::new(&mut b, 2)];
        session.read_list(&mut targets).await.unwrap();
        assert_eq!(a.value(2), Some(&DataObject::Unsigned8(5)));
        assert_eq!(b.value(2), Some(&DataObject::Unsigned8(6)));
        assert!(session.supports_multiple_references());
    }

    #[tokio::test]
    async fn test_read_list_count_mismatch_fails_call() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x06, &[5]));
        media.push_reply(frame(0x01, &[7]));
        media.push_reply(frame(0x01, &[8]));
        let sink = MemorySink::default();
        let mut session = build(batched_client(), media, &sink);
        session.multiple_references = true;

        let (mut a, mut b) = (register(1), register(2));
        let mut targets = vec![ReadTarget::new(&mut a, 2), ReadTarget::new(&mut b, 2)];
        let err = session.read_list(&mut targets).await.unwrap_err();
        assert!(matches!(err, DlmsError::CountMismatch { expected: 2, actual: 1 }));
        assert!(!session.supports_multiple_references());

        session.read_list(&mut targets).await.unwrap();
        drop(targets);
        assert_eq!(a.value(2), Some(&DataObject::Unsigned8(7)));
        assert_eq!(b.value(2), Some(&DataObject::Unsigned8(8)));

        let media = session.media().exclusive_access().await;
        let batched = media.sent.iter().filter(|p| p[0] == READ_LIST).count();
        assert_eq!(batched, 1);
        assert_eq!(media.sent.len(), 3);
    }

    #[tokio::test]
    async fn test_read_list_disabled_for_later_calls() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x05, &[3]));
        for v in 1..=3 {
            media.push_reply(frame(0x01, &[v]));
        }
        let sink = MemorySink::default();
        let mut session = build(batched_client(), media, &sink);
        session.multiple_references = true;

        let (mut a, mut b) = (register(1), register(2));
        let mut targets = vec![ReadTarget::new(&mut a, 2), ReadTarget::new(&mut b, 2)];
        let err = session.read_list(&mut targets).await.unwrap_err();
        assert!(matches!(err, DlmsError::Protocol(3)));

        let (mut c, mut d, mut e) = (register(3), register(4), register(5));
        let mut targets = vec![
            ReadTarget::new(&mut c, 2),
            ReadTarget::new(&mut d, 2),
            ReadTarget::new(&mut e, 2),
        ];
        session.read_list(&mut targets).await.unwrap();
        assert_eq!(e.value(2), Some(&DataObject::Unsigned8(3)));

        let media = session.media().exclusive_access().await;
        let batched = media.sent.iter().filter(|p| p[0] == READ_LIST).count();
        assert_eq!(batched, 1);
        assert_eq!(media.sent.len(), 4);
    }

    #[tokio::test]
    async fn test_read_list_timeout_propagates() {
        let sink = MemorySink::default();
        let mut session = build(batched_client(), MockMedia::network(), &sink);
        session.multiple_references = true;
        let mut a = register(1);
        let mut targets = vec![ReadTarget::new(&mut a, 2)];
        let err = session.read_list(&mut targets).await.unwrap_err();
        assert!(matches!(err, DlmsError::TransportTimeout(_)));
        assert!(session.supports_multiple_references());
    }

    #[tokio::test]
    async fn test_read_values_continues_after_failure() {
        let mut media = MockMedia::network();
        for i in 1..=5u8 {
            if i == 3 {
                media.push_reply(frame(0x05, &[4]));
                media.push_reply(frame(0x05, &[4]));
            } else {
                media.push_reply(frame(0x01, &[i]));
                media.push_reply(frame(0x01, &[i]));
            }
        }
        let sink = MemorySink::default();
        let mut session = build(ScriptedClient::hdlc(), media, &sink);
        *session.objects_mut() = (1..=5).map(data).collect();

        session.read_values().await.unwrap();

        assert_eq!(session.media().exclusive_access().await.sent.len(), 10);
        let errors: Vec<_> = sink
            .lines_at(TraceLevel::Error)
            .into_iter()
            .filter(|l| l.starts_with("Error! Index: "))
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(sink.diagnostics().is_empty());
        let objects: Vec<_> = session.objects().iter().collect();
        assert_eq!(objects[4].value(2), Some(&DataObject::Unsigned8(5)));
        assert!(objects[2].value(2).is_none());
    }

    #[tokio::test]
    async fn test_read_values_skips_unknown_and_profiles() {
        let sink = MemorySink::default();
        let mut session = build(ScriptedClient::hdlc(), MockMedia::network(), &sink);
        *session.objects_mut() = vec![
            CosemObject::new(ObjectType::Unknown(9000), ObisCode::new(0, 0, 96, 1, 0, 255)),
            profile(),
        ]
        .into_iter()
        .collect();
        session.read_values().await.unwrap();
        assert!(session.media().exclusive_access().await.sent.is_empty());
        assert!(sink.contains(TraceLevel::Info, "Unknown Interface"));
    }

    #[tokio::test]
    async fn test_non_protocol_failure_is_diagnosed() {
        let mut client = ScriptedClient::hdlc();
        client.fail_update = true;
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[1]));
        media.push_reply(frame(0x01, &[1]));
        let sink = MemorySink::default();
        let mut session = build(client, media, &sink);
        *session.objects_mut() = vec![data(1)].into_iter().collect();
        session.read_values().await.unwrap();
        assert_eq!(sink.diagnostics().len(), 2);
    }

    #[tokio::test]
    async fn test_scalers_fall_back_and_swallow_failures() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x05, &[1]));
        media.push_reply(frame(0x05, &[4]));
        media.push_reply(frame(0x01, &[9]));
        let sink = MemorySink::default();
        let mut session = build(batched_client(), media, &sink);
        session.multiple_references = true;
        *session.objects_mut() = vec![register(1), data(2), register(3)].into_iter().collect();

        session.read_scalers_and_units().await.unwrap();

        assert!(!session.supports_multiple_references());
        let sent = session.media().exclusive_access().await.sent.clone();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0][0], READ_LIST);
        let objects: Vec<_> = session.objects().iter().collect();
        assert!(objects[0].value(3).is_none());
        assert_eq!(objects[2].value(3), Some(&DataObject::Unsigned8(9)));
    }

    #[tokio::test]
    async fn test_columns_pass_continues_after_failure() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x05, &[4]));
        media.push_reply(capture_frame(2));
        let sink = MemorySink::default();
        let mut session = build(ScriptedClient::hdlc(), media, &sink);
        let second = CosemObject::new(ObjectType::ProfileGeneric, ObisCode::new(1, 0, 99, 2, 0, 255));
        *session.objects_mut() = vec![profile(), second].into_iter().collect();

        session.read_profile_generic_columns().await.unwrap();

        let objects: Vec<_> = session.objects().iter().collect();
        assert!(objects[0].capture_objects().is_empty());
        assert_eq!(objects[1].capture_objects().len(), 2);
        assert!(sink.contains(TraceLevel::Error, "Err! Failed to read columns: "));
    }

    #[tokio::test]
    async fn test_history_reads_last_row_and_today() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[3]));
        media.push_reply(frame(0x01, &[10]));
        media.push_reply(frame(0x07, &[1]));
        media.push_reply(frame(0x05, &[4]));
        let sink = MemorySink::default();
        let mut session = build(ScriptedClient::hdlc(), media, &sink);
        let mut pg = profile();
        pg.set_value(
            profile_generic::CAPTURE_OBJECTS,
            DataObject::Array(vec![crate::testing::capture_definition()]),
        )
        .unwrap();
        *session.objects_mut() = vec![pg].into_iter().collect();

        session.read_profile_generics().await.unwrap();

        assert_eq!(session.client().rows_by_entry, vec![(3, 1)]);
        assert_eq!(session.client().rows_by_range, 1);
        assert!(sink.contains(TraceLevel::Info, "Entries: 3/10"));
        assert!(sink.contains(TraceLevel::Error, "Error! Failed to read last day: "));
    }

    #[tokio::test]
    async fn test_history_skips_empty_profiles() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[0]));
        media.push_reply(frame(0x01, &[10]));
        let sink = MemorySink::default();
        let mut session = build(ScriptedClient::hdlc(), media, &sink);
        *session.objects_mut() = vec![profile()].into_iter().collect();
        session.read_profile_generics().await.unwrap();
        assert_eq!(session.media().exclusive_access().await.sent.len(), 2);
        assert!(session.client().rows_by_entry.is_empty());
    }

    #[tokio::test]
    async fn test_read_all_aare_failure_closes_once() {
        let mut client = ScriptedClient::hdlc();
        client.fail_aare = true;
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[0x81]));
        media.push_reply(frame(0x01, &[0x61]));
        media.push_reply(frame(0x01, &[0]));
        let sink = MemorySink::default();
        let mut session = build(client, media, &sink);

        let err = session.read_all().await.unwrap_err();
        assert!(matches!(err, DlmsError::InvalidData(_)));

        let media = session.media().exclusive_access().await;
        assert!(!media.sent.iter().any(|p| p.as_slice() == OBJECTS));
        assert_eq!(media.sent.iter().filter(|p| p.as_slice() == DISCONNECT).count(), 1);
        assert_eq!(media.closed, 1);
    }

    #[tokio::test]
    async fn test_read_all_keeps_open_error_over_close_error() {
        let mut client = ScriptedClient::hdlc();
        client.fail_aare = true;
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[0x81]));
        media.push_reply(frame(0x01, &[0x61]));
        let sink = MemorySink::default();
        let mut session = build(client, media, &sink);
        let err = session.read_all().await.unwrap_err();
        assert!(matches!(err, DlmsError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_read_all_full_run() {
        let mut client = ScriptedClient::wrapper();
        client.catalog = vec![register(1)].into_iter().collect();
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[0x61]));
        media.push_reply(frame(0x01, &[0]));
        media.push_reply(frame(0x01, &[1]));
        for v in 1..=3 {
            media.push_reply(frame(0x01, &[v]));
        }
        media.push_reply(frame(0x01, &[0]));
        media.push_reply(frame(0x01, &[0]));
        let sink = MemorySink::default();
        let mut session = build(client, media, &sink);

        session.read_all().await.unwrap();

        let objects: Vec<_> = session.objects().iter().collect();
        assert_eq!(objects[0].value(2), Some(&DataObject::Unsigned8(2)));
        let media = session.media().exclusive_access().await;
        assert!(!media.open);
        assert_eq!(media.sent.last().map(Vec::as_slice), Some(DISCONNECT));
    }

    #[tokio::test]
    async fn test_read_all_cancelled_closes_locally() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[0x81]));
        media.push_reply(frame(0x01, &[0x61]));
        let sink = MemorySink::default();
        let mut session = build(ScriptedClient::hdlc(), media, &sink);
        let token = session.cancellation_token();
        session.client_mut().on_aare = Some(Box::new(move || token.cancel()));

        let err = session.read_all().await.unwrap_err();
        assert!(err.is_cancelled());
        let media = session.media().exclusive_access().await;
        assert!(!media.sent.iter().any(|p| p.as_slice() == OBJECTS || p.as_slice() == DISCONNECT));
        assert_eq!(media.closed, 1);
    }

    #[tokio::test]
    async fn test_read_selected() {
        let mut client = ScriptedClient::wrapper();
        client.catalog = vec![register(1), register(2)].into_iter().collect();
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[0x61]));
        media.push_reply(frame(0x01, &[0]));
        media.push_reply(frame(0x01, &[11]));
        media.push_reply(frame(0x01, &[22]));
        media.push_reply(frame(0x01, &[0]));
        media.push_reply(frame(0x01, &[0]));
        let sink = MemorySink::default();
        let mut session = build(client, media, &sink);

        let values = session
            .read_selected(&[(ObisCode::new(1, 0, 2, 8, 0, 255), 2), (ObisCode::new(1, 0, 1, 8, 0, 255), 2)])
            .await
            .unwrap();
        assert_eq!(values, vec![DataObject::Unsigned8(11), DataObject::Unsigned8(22)]);
        assert!(sink.contains(TraceLevel::Info, "Index: 2 Value: 11"));
    }

    #[tokio::test]
    async fn test_read_selected_unknown_target() {
        let mut client = ScriptedClient::wrapper();
        client.catalog = vec![register(1)].into_iter().collect();
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[0x61]));
        media.push_reply(frame(0x01, &[0]));
        media.push_reply(frame(0x01, &[0]));
        media.push_reply(frame(0x01, &[0]));
        let sink = MemorySink::default();
        let mut session = build(client, media, &sink);
        let err = session
            .read_selected(&[(ObisCode::new(0, 0, 96, 1, 0, 255), 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, DlmsError::InvalidData(_)));
        assert!(!session.media().exclusive_access().await.open);
    }

    #[tokio::test]
    async fn test_write_single_exchange() {
        let mut media = MockMedia::network();
        media.push_reply(frame(0x01, &[0]));
        let sink = MemorySink::default();
        let mut session = build(ScriptedClient::hdlc(), media, &sink);
        let mut object = register(1);
        object.set_value(2, DataObject::Unsigned8(5)).unwrap();
        session.write(&object, 2).await.unwrap();
        assert_eq!(session.media().exclusive_access().await.sent.len(), 1);
    }
}
