//! DTO 与领域实体之间的双向转换
//!
//! 纯函数，无 I/O。时间戳在边界为 RFC 3339 字符串（微秒精度），
//! 转换失败一律映射为验证错误。

use chrono::{DateTime, SecondsFormat, Utc};
use domain::{
    ChatMessage, ChatMessageSnapshot, ChatThread, ChatThreadSnapshot, Participant, PropertySummary,
};

use crate::dto::{ChatMessageDto, ChatParticipantDto, ChatThreadDto, PropertySummaryDto};
use crate::error::{ChatError, ChatResult};

/// 解析边界时间戳
pub fn parse_timestamp(field: &'static str, value: &str) -> ChatResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ChatError::validation(field, "必须是合法的 RFC 3339 时间戳"))
}

/// 格式化边界时间戳（微秒精度，UTC）
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn to_domain_message(dto: &ChatMessageDto) -> ChatResult<ChatMessage> {
    let snapshot = ChatMessageSnapshot {
        id: dto.id,
        thread_id: dto.thread_id,
        sender_type: dto.sender_type,
        sender_id: dto.sender_id,
        body: dto.body.clone(),
        payload: dto.payload.clone(),
        created_at: parse_timestamp("created_at", &dto.created_at)?,
        delivered_at: dto
            .delivered_at
            .as_deref()
            .map(|v| parse_timestamp("delivered_at", v))
            .transpose()?,
        read_at: dto
            .read_at
            .as_deref()
            .map(|v| parse_timestamp("read_at", v))
            .transpose()?,
    };
    Ok(ChatMessage::restore(snapshot)?)
}

pub fn from_domain_message(message: &ChatMessage) -> ChatMessageDto {
    let snapshot = message.to_snapshot();
    ChatMessageDto {
        id: snapshot.id,
        thread_id: snapshot.thread_id,
        sender_type: snapshot.sender_type,
        sender_id: snapshot.sender_id,
        body: snapshot.body,
        payload: snapshot.payload,
        created_at: format_timestamp(snapshot.created_at),
        delivered_at: snapshot.delivered_at.map(format_timestamp),
        read_at: snapshot.read_at.map(format_timestamp),
    }
}

fn to_domain_participant(dto: &ChatParticipantDto) -> ChatResult<Participant> {
    let mut participant = Participant::new(dto.id, dto.participant_type, dto.display_name.clone())
        .with_contact_info(dto.email.clone(), dto.phone.clone());
    if let Some(at) = dto.last_seen_at.as_deref() {
        participant.mark_seen(parse_timestamp("last_seen_at", at)?);
    }
    Ok(participant)
}

fn from_domain_participant(participant: &Participant) -> ChatParticipantDto {
    ChatParticipantDto {
        id: participant.id(),
        participant_type: participant.kind(),
        display_name: participant.display_name.clone(),
        email: participant.email.clone(),
        phone: participant.phone.clone(),
        last_seen_at: participant.last_seen_at.map(format_timestamp),
    }
}

fn to_domain_property(dto: &PropertySummaryDto) -> PropertySummary {
    PropertySummary {
        id: dto.id.into(),
        title: dto.title.clone(),
        price: dto.price,
        cover_image_url: dto.cover_image_url.clone(),
    }
}

fn from_domain_property(property: &PropertySummary) -> PropertySummaryDto {
    PropertySummaryDto {
        id: property.id.into(),
        title: property.title.clone(),
        price: property.price,
        cover_image_url: property.cover_image_url.clone(),
    }
}

pub fn to_domain_thread(dto: &ChatThreadDto) -> ChatResult<ChatThread> {
    let participants = dto
        .participants
        .iter()
        .map(to_domain_participant)
        .collect::<ChatResult<Vec<_>>>()?;

    let snapshot = ChatThreadSnapshot {
        id: dto.id,
        org_id: dto.org_id,
        property: dto.property.as_ref().map(to_domain_property),
        contact_id: dto.contact_id,
        created_by: dto.created_by,
        participants,
        created_at: parse_timestamp("created_at", &dto.created_at)?,
        last_message_at: dto
            .last_message_at
            .as_deref()
            .map(|v| parse_timestamp("last_message_at", v))
            .transpose()?,
        unread_count: dto.unread_count,
        status: dto.status,
    };
    Ok(ChatThread::restore(snapshot)?)
}

pub fn from_domain_thread(thread: &ChatThread) -> ChatThreadDto {
    let snapshot = thread.to_snapshot();
    ChatThreadDto {
        id: snapshot.id,
        org_id: snapshot.org_id,
        property: snapshot.property.as_ref().map(from_domain_property),
        contact_id: snapshot.contact_id,
        created_by: snapshot.created_by,
        participants: snapshot.participants.iter().map(from_domain_participant).collect(),
        created_at: format_timestamp(snapshot.created_at),
        last_message_at: snapshot.last_message_at.map(format_timestamp),
        unread_count: snapshot.unread_count,
        status: snapshot.status,
    }
}
