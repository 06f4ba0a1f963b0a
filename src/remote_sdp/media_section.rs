use sdp::description::common::{Address, Attribute, ConnectionInformation};
use sdp::description::media::{MediaDescription, MediaName, RangedPort};
use sdp::description::session::{
    ATTR_KEY_CANDIDATE, ATTR_KEY_CONNECTION_SETUP, ATTR_KEY_END_OF_CANDIDATES, ATTR_KEY_EXT_MAP,
    ATTR_KEY_INACTIVE, ATTR_KEY_MID, ATTR_KEY_MSID, ATTR_KEY_RECV_ONLY, ATTR_KEY_RTCPMUX,
    ATTR_KEY_RTCPRSIZE, ATTR_KEY_SEND_ONLY, ATTR_KEY_SEND_RECV, ATTR_KEY_SSRC, ATTR_KEY_SSRCGROUP,
    SEMANTIC_TOKEN_FLOW_IDENTIFICATION,
};
use sdp::util::ConnectionRole;

use crate::dtls_transport::DtlsRole;
use crate::error::{Error, Result};
use crate::ice_transport::{IceCandidate, IceParameters};
use crate::rtp_parameters::{
    fmtp_line, MediaKind, ParameterValue, ProducerCodecOptions, RtpCodecParameters,
    RtpParameters,
};
use crate::sctp_transport::SctpParameters;

pub(crate) const ATTR_KEY_RTCP_FB: &str = "rtcp-fb";
pub(crate) const ATTR_KEY_RID: &str = "rid";
pub(crate) const ATTR_KEY_EXTMAP_ALLOW_MIXED: &str = "extmap-allow-mixed";
pub(crate) const ATTR_KEY_SIMULCAST: &str = "simulcast";
pub(crate) const ATTR_KEY_SCTP_PORT: &str = "sctp-port";
pub(crate) const ATTR_KEY_MAX_MESSAGE_SIZE: &str = "max-message-size";
pub(crate) const ATTR_KEY_ICE_UFRAG: &str = "ice-ufrag";
pub(crate) const ATTR_KEY_ICE_PWD: &str = "ice-pwd";
pub(crate) const ATTR_KEY_ICE_OPTIONS: &str = "ice-options";

/// Mid of the SCTP section the server announces for data channels.
pub const DATA_CHANNEL_MID: &str = "datachannel";

const DUMMY_PORT: isize = 7;
const DUMMY_ADDRESS: &str = "127.0.0.1";
const RTP_PROTOS: [&str; 4] = ["UDP", "TLS", "RTP", "SAVPF"];
const SCTP_PROTOS: [&str; 3] = ["UDP", "DTLS", "SCTP"];
const SCTP_FORMAT: &str = "webrtc-datachannel";
const DEFAULT_MAX_MESSAGE_SIZE: u32 = 262144;

/// Which side of the offer/answer exchange a section speaks for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaSectionRole {
    /// The remote side declares a stream it sends to us.
    Offer,
    /// The remote side answers a section of our local offer.
    Answer,
}

/// Connectivity shared by every section of one remote description.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SectionTransport<'a> {
    pub(crate) ice_parameters: Option<&'a IceParameters>,
    pub(crate) ice_candidates: &'a [IceCandidate],
    pub(crate) dtls_role: Option<DtlsRole>,
}

/// Inputs of an answer section.
pub(crate) struct AnswerSectionParams<'a> {
    pub(crate) offer_media: &'a MediaDescription,
    pub(crate) answer_rtp_parameters: Option<&'a RtpParameters>,
    pub(crate) sctp_parameters: Option<&'a SctpParameters>,
    pub(crate) codec_options: Option<&'a ProducerCodecOptions>,
    pub(crate) extmap_allow_mixed: bool,
}

/// Inputs of an offer section.
pub(crate) struct OfferSectionParams<'a> {
    pub(crate) mid: &'a str,
    pub(crate) kind: MediaKind,
    pub(crate) offer_rtp_parameters: Option<&'a RtpParameters>,
    pub(crate) sctp_parameters: Option<&'a SctpParameters>,
    pub(crate) stream_id: Option<&'a str>,
    pub(crate) track_id: Option<&'a str>,
}

/// MediaSection is one `m=` block of the remote description.
#[derive(Debug, Clone)]
pub struct MediaSection {
    role: MediaSectionRole,
    mid: String,
    kind: MediaKind,
    closed: bool,
    media: MediaDescription,
}

impl MediaSection {
    /// answer builds the remote answer to one section of the local offer.
    pub(crate) fn answer(
        transport: SectionTransport<'_>,
        params: AnswerSectionParams<'_>,
    ) -> Result<Self> {
        let offer = params.offer_media;
        let mid = match offer.attribute(ATTR_KEY_MID) {
            Some(Some(mid)) if !mid.is_empty() => mid.to_owned(),
            _ => {
                return Err(Error::ErrParameter(
                    "offer media section without mid".to_owned(),
                ))
            }
        };
        let kind = MediaKind::from(offer.media_name.media.as_str());

        let mut media = base_media(
            &offer.media_name.media,
            offer.media_name.protos.iter().map(String::as_str),
        );

        match kind {
            MediaKind::Audio | MediaKind::Video => {
                let answer = params.answer_rtp_parameters.ok_or_else(|| {
                    Error::ErrParameter("missing answer rtp parameters".to_owned())
                })?;
                media = with_codecs(media, &answer.codecs, kind, params.codec_options);

                for ext in &answer.header_extensions {
                    if offer_has_extmap(offer, &ext.uri) {
                        media = media.with_value_attribute(
                            ATTR_KEY_EXT_MAP.to_owned(),
                            format!("{} {}", ext.id, ext.uri),
                        );
                    }
                }
                if params.extmap_allow_mixed
                    && offer.attribute(ATTR_KEY_EXTMAP_ALLOW_MIXED).is_some()
                {
                    media = media.with_property_attribute(ATTR_KEY_EXTMAP_ALLOW_MIXED.to_owned());
                }

                let rids = offer_send_rids(offer);
                if !rids.is_empty() {
                    for rid in &rids {
                        media = media
                            .with_value_attribute(ATTR_KEY_RID.to_owned(), format!("{rid} recv"));
                    }
                    media = media.with_value_attribute(
                        ATTR_KEY_SIMULCAST.to_owned(),
                        format!("recv {}", rids.join(";")),
                    );
                }

                media = media
                    .with_property_attribute(ATTR_KEY_RTCPMUX.to_owned())
                    .with_property_attribute(ATTR_KEY_RTCPRSIZE.to_owned());
            }
            MediaKind::Application => {
                media.media_name.formats = offer.media_name.formats.clone();
                if let Some(sctp) = params.sctp_parameters {
                    media = media
                        .with_value_attribute(ATTR_KEY_SCTP_PORT.to_owned(), sctp.port.to_string())
                        .with_value_attribute(
                            ATTR_KEY_MAX_MESSAGE_SIZE.to_owned(),
                            max_message_size(sctp).to_string(),
                        );
                }
            }
            MediaKind::Unspecified => {
                return Err(Error::ErrUnsupported(format!(
                    "unknown media kind {} in offer",
                    offer.media_name.media
                )))
            }
        }

        let mut section = MediaSection {
            role: MediaSectionRole::Answer,
            mid,
            kind,
            closed: false,
            media,
        };
        section.apply_transport(transport);
        if kind.is_media() {
            section.set_direction(answer_direction(offer));
        }

        Ok(section)
    }

    /// offer builds a section through which the remote side sends one stream
    /// (or the data channel association) to us.
    pub(crate) fn offer(
        transport: SectionTransport<'_>,
        params: OfferSectionParams<'_>,
    ) -> Result<Self> {
        if params.mid.is_empty() {
            return Err(Error::ErrParameter("missing mid".to_owned()));
        }

        let kind_str = params.kind.to_string();
        let mut media = match params.kind {
            MediaKind::Audio | MediaKind::Video => {
                let offer = params.offer_rtp_parameters.ok_or_else(|| {
                    Error::ErrParameter("missing offer rtp parameters".to_owned())
                })?;
                let mut media = with_codecs(
                    base_media(&kind_str, RTP_PROTOS.into_iter()),
                    &offer.codecs,
                    params.kind,
                    None,
                );
                for ext in &offer.header_extensions {
                    media = media.with_value_attribute(
                        ATTR_KEY_EXT_MAP.to_owned(),
                        format!("{} {}", ext.id, ext.uri),
                    );
                }
                media = media
                    .with_property_attribute(ATTR_KEY_RTCPMUX.to_owned())
                    .with_property_attribute(ATTR_KEY_RTCPRSIZE.to_owned());

                let stream_id = params.stream_id.unwrap_or("-");
                if let Some(track_id) = params.track_id {
                    media = media.with_value_attribute(
                        ATTR_KEY_MSID.to_owned(),
                        format!("{stream_id} {track_id}"),
                    );
                }
                with_ssrcs(media, offer, stream_id, params.track_id)
            }
            MediaKind::Application => {
                let mut media = base_media(&kind_str, SCTP_PROTOS.into_iter());
                media.media_name.formats = vec![SCTP_FORMAT.to_owned()];
                if let Some(sctp) = params.sctp_parameters {
                    media = media
                        .with_value_attribute(ATTR_KEY_SCTP_PORT.to_owned(), sctp.port.to_string())
                        .with_value_attribute(
                            ATTR_KEY_MAX_MESSAGE_SIZE.to_owned(),
                            max_message_size(sctp).to_string(),
                        );
                }
                media
            }
            MediaKind::Unspecified => {
                return Err(Error::ErrParameter(
                    "offer section needs a media kind".to_owned(),
                ))
            }
        };
        media = media.with_value_attribute(ATTR_KEY_MID.to_owned(), params.mid.to_owned());

        let mut section = MediaSection {
            role: MediaSectionRole::Offer,
            mid: params.mid.to_owned(),
            kind: params.kind,
            closed: false,
            media,
        };
        section.apply_transport(transport);
        if params.kind.is_media() {
            section.set_direction(ATTR_KEY_SEND_ONLY);
        }

        Ok(section)
    }

    pub fn role(&self) -> MediaSectionRole {
        self.role
    }

    pub fn mid(&self) -> &str {
        &self.mid
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    /// media is the `sdp` representation written into the description.
    pub fn media(&self) -> &MediaDescription {
        &self.media
    }

    /// direction is the current direction attribute of the section.
    pub fn direction(&self) -> Option<&str> {
        self.media.attributes.iter().find_map(|a| {
            if is_direction_key(&a.key) {
                Some(a.key.as_str())
            } else {
                None
            }
        })
    }

    pub(crate) fn set_ice_parameters(&mut self, ice_parameters: &IceParameters) {
        set_attribute(
            &mut self.media,
            ATTR_KEY_ICE_UFRAG,
            Some(ice_parameters.username_fragment.clone()),
        );
        set_attribute(
            &mut self.media,
            ATTR_KEY_ICE_PWD,
            Some(ice_parameters.password.clone()),
        );
    }

    /// Answer sections follow the remote role. Offer sections always
    /// announce `actpass`.
    pub(crate) fn set_dtls_role(&mut self, role: DtlsRole) {
        let connection_role = match self.role {
            MediaSectionRole::Answer => role.to_connection_role(),
            MediaSectionRole::Offer => ConnectionRole::Actpass,
        };
        set_attribute(
            &mut self.media,
            ATTR_KEY_CONNECTION_SETUP,
            Some(connection_role.to_string()),
        );
    }

    /// disable keeps the section addressable but stops media on it.
    pub(crate) fn disable(&mut self) {
        self.set_direction(ATTR_KEY_INACTIVE);
        for key in [
            ATTR_KEY_EXT_MAP,
            ATTR_KEY_SSRC,
            ATTR_KEY_SSRCGROUP,
            ATTR_KEY_SIMULCAST,
            ATTR_KEY_RID,
        ] {
            remove_attribute(&mut self.media, key);
        }
    }

    /// close disables the section, rejects it with port 0 and marks it as
    /// reusable.
    pub(crate) fn close(&mut self) {
        self.disable();
        remove_attribute(&mut self.media, ATTR_KEY_EXTMAP_ALLOW_MIXED);
        self.media.media_name.port.value = 0;
        self.closed = true;
    }

    /// plan_b_receive adds another stream to an existing offer section.
    pub(crate) fn plan_b_receive(
        &mut self,
        offer_rtp_parameters: &RtpParameters,
        stream_id: &str,
        track_id: Option<&str>,
    ) {
        let media = std::mem::take(&mut self.media);
        self.media = with_ssrcs(media, offer_rtp_parameters, stream_id, track_id);
    }

    /// plan_b_stop_receiving drops the ssrc lines of one stream.
    pub(crate) fn plan_b_stop_receiving(&mut self, offer_rtp_parameters: &RtpParameters) {
        let Some(encoding) = offer_rtp_parameters.encodings.first() else {
            return;
        };
        let ssrc = encoding.ssrc;
        let rtx_ssrc = encoding.rtx.as_ref().map(|rtx| rtx.ssrc);

        self.media.attributes.retain(|a| match (a.key.as_str(), &a.value) {
            (ATTR_KEY_SSRC, Some(value)) => {
                let id = value.split(' ').next().and_then(|s| s.parse::<u32>().ok());
                id.is_none() || (id != ssrc && id != rtx_ssrc)
            }
            (ATTR_KEY_SSRCGROUP, Some(value)) => match (ssrc, rtx_ssrc) {
                (Some(ssrc), Some(rtx_ssrc)) => {
                    value != &format!("{SEMANTIC_TOKEN_FLOW_IDENTIFICATION} {ssrc} {rtx_ssrc}")
                }
                _ => true,
            },
            _ => true,
        });
    }

    fn apply_transport(&mut self, transport: SectionTransport<'_>) {
        if let Some(ice_parameters) = transport.ice_parameters {
            self.set_ice_parameters(ice_parameters);
        }
        if !transport.ice_candidates.is_empty() {
            for candidate in transport.ice_candidates {
                self.media.attributes.push(Attribute::new(
                    ATTR_KEY_CANDIDATE.to_owned(),
                    Some(candidate.to_sdp_value()),
                ));
            }
            self.media
                .attributes
                .push(Attribute::new(ATTR_KEY_END_OF_CANDIDATES.to_owned(), None));
            self.media.attributes.push(Attribute::new(
                ATTR_KEY_ICE_OPTIONS.to_owned(),
                Some("renomination".to_owned()),
            ));
        }
        if let Some(role) = transport.dtls_role {
            self.set_dtls_role(role);
        }
        if self.role == MediaSectionRole::Answer {
            set_attribute(&mut self.media, ATTR_KEY_MID, Some(self.mid.clone()));
        }
    }

    fn set_direction(&mut self, direction: &str) {
        self.media.attributes.retain(|a| !is_direction_key(&a.key));
        self.media
            .attributes
            .push(Attribute::new(direction.to_owned(), None));
    }
}

fn base_media<'a>(media: &str, protos: impl Iterator<Item = &'a str>) -> MediaDescription {
    MediaDescription {
        media_name: MediaName {
            media: media.to_owned(),
            port: RangedPort {
                value: DUMMY_PORT,
                range: None,
            },
            protos: protos.map(str::to_owned).collect(),
            formats: vec![],
        },
        media_title: None,
        connection_information: Some(ConnectionInformation {
            network_type: "IN".to_owned(),
            address_type: "IP4".to_owned(),
            address: Some(Address {
                address: DUMMY_ADDRESS.to_owned(),
                ttl: None,
                range: None,
            }),
        }),
        bandwidth: vec![],
        encryption_key: None,
        attributes: vec![],
    }
}

fn with_codecs(
    mut media: MediaDescription,
    codecs: &[RtpCodecParameters],
    kind: MediaKind,
    codec_options: Option<&ProducerCodecOptions>,
) -> MediaDescription {
    for codec in codecs {
        let mut parameters = codec.parameters.clone();
        if let Some(options) = codec_options {
            apply_codec_options(&mut parameters, codec, kind, options);
        }
        let channels = match codec.channels {
            Some(channels) if channels > 1 => channels,
            _ => 0,
        };
        media = media.with_codec(
            codec.payload_type,
            codec.encoding_name().to_owned(),
            codec.clock_rate,
            channels,
            fmtp_line(&parameters),
        );
        for feedback in &codec.rtcp_feedback {
            let value = if feedback.parameter.is_empty() {
                format!("{} {}", codec.payload_type, feedback.typ)
            } else {
                format!(
                    "{} {} {}",
                    codec.payload_type, feedback.typ, feedback.parameter
                )
            };
            media = media.with_value_attribute(ATTR_KEY_RTCP_FB.to_owned(), value);
        }
    }
    media
}

fn apply_codec_options(
    parameters: &mut crate::rtp_parameters::RtpParameterMap,
    codec: &RtpCodecParameters,
    kind: MediaKind,
    options: &ProducerCodecOptions,
) {
    let flag = |b: bool| ParameterValue::Number(u32::from(b));
    let mime_type = codec.mime_type.to_lowercase();

    if kind == MediaKind::Audio && mime_type == "audio/opus" {
        if let Some(stereo) = options.opus_stereo {
            parameters.insert("stereo".to_owned(), flag(stereo));
            parameters.insert("sprop-stereo".to_owned(), flag(stereo));
        }
        if let Some(fec) = options.opus_fec {
            parameters.insert("useinbandfec".to_owned(), flag(fec));
        }
        if let Some(dtx) = options.opus_dtx {
            parameters.insert("usedtx".to_owned(), flag(dtx));
        }
        if let Some(rate) = options.opus_max_playback_rate {
            parameters.insert("maxplaybackrate".to_owned(), rate.into());
        }
        if let Some(bitrate) = options.opus_max_average_bitrate {
            parameters.insert("maxaveragebitrate".to_owned(), bitrate.into());
        }
        if let Some(ptime) = options.opus_ptime {
            parameters.insert("ptime".to_owned(), ptime.into());
        }
    }

    if kind == MediaKind::Video
        && matches!(
            mime_type.as_str(),
            "video/vp8" | "video/vp9" | "video/h264" | "video/h265"
        )
    {
        if let Some(bitrate) = options.video_google_start_bitrate {
            parameters.insert("x-google-start-bitrate".to_owned(), bitrate.into());
        }
        if let Some(bitrate) = options.video_google_max_bitrate {
            parameters.insert("x-google-max-bitrate".to_owned(), bitrate.into());
        }
        if let Some(bitrate) = options.video_google_min_bitrate {
            parameters.insert("x-google-min-bitrate".to_owned(), bitrate.into());
        }
    }
}

/// with_ssrcs announces the stream's ssrc (and its RTX ssrc) with cname and
/// msid lines.
fn with_ssrcs(
    mut media: MediaDescription,
    parameters: &RtpParameters,
    stream_id: &str,
    track_id: Option<&str>,
) -> MediaDescription {
    let Some(encoding) = parameters.encodings.first() else {
        return media;
    };
    let Some(ssrc) = encoding.ssrc else {
        return media;
    };
    let cname = parameters.rtcp.cname.as_deref().unwrap_or(stream_id);
    let rtx_ssrc = encoding.rtx.as_ref().map(|rtx| rtx.ssrc);

    if let Some(rtx_ssrc) = rtx_ssrc {
        media = media.with_value_attribute(
            ATTR_KEY_SSRCGROUP.to_owned(),
            format!("{SEMANTIC_TOKEN_FLOW_IDENTIFICATION} {ssrc} {rtx_ssrc}"),
        );
    }
    for id in std::iter::once(ssrc).chain(rtx_ssrc) {
        media = media.with_value_attribute(ATTR_KEY_SSRC.to_owned(), format!("{id} cname:{cname}"));
        if let Some(track_id) = track_id {
            media = media.with_value_attribute(
                ATTR_KEY_SSRC.to_owned(),
                format!("{id} msid:{stream_id} {track_id}"),
            );
        }
    }
    media
}

fn answer_direction(offer: &MediaDescription) -> &'static str {
    for attribute in &offer.attributes {
        match attribute.key.as_str() {
            ATTR_KEY_SEND_ONLY => return ATTR_KEY_RECV_ONLY,
            ATTR_KEY_RECV_ONLY => return ATTR_KEY_SEND_ONLY,
            ATTR_KEY_INACTIVE => return ATTR_KEY_INACTIVE,
            ATTR_KEY_SEND_RECV => return ATTR_KEY_SEND_RECV,
            _ => {}
        }
    }
    ATTR_KEY_SEND_RECV
}

fn offer_has_extmap(offer: &MediaDescription, uri: &str) -> bool {
    offer.attributes.iter().any(|a| {
        a.key == ATTR_KEY_EXT_MAP
            && a
                .value
                .as_deref()
                .and_then(|v| v.split_whitespace().nth(1))
                .map(|offered| offered == uri)
                .unwrap_or(false)
    })
}

/// offer_send_rids lists the simulcast rids the local offer sends.
fn offer_send_rids(offer: &MediaDescription) -> Vec<String> {
    if offer.attribute(ATTR_KEY_SIMULCAST).is_none() {
        return vec![];
    }
    offer
        .attributes
        .iter()
        .filter(|a| a.key == ATTR_KEY_RID)
        .filter_map(|a| {
            let value = a.value.as_deref()?;
            let mut fields = value.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(id), Some("send")) => Some(id.to_owned()),
                _ => None,
            }
        })
        .collect()
}

fn is_direction_key(key: &str) -> bool {
    matches!(
        key,
        ATTR_KEY_SEND_RECV | ATTR_KEY_SEND_ONLY | ATTR_KEY_RECV_ONLY | ATTR_KEY_INACTIVE
    )
}

fn set_attribute(media: &mut MediaDescription, key: &str, value: Option<String>) {
    match media.attributes.iter_mut().find(|a| a.key == key) {
        Some(attribute) => attribute.value = value,
        None => media.attributes.push(Attribute::new(key.to_owned(), value)),
    }
}

fn remove_attribute(media: &mut MediaDescription, key: &str) {
    media.attributes.retain(|a| a.key != key);
}

/// Default size announced when the server leaves max-message-size unset.
pub(crate) fn max_message_size(sctp: &SctpParameters) -> u32 {
    if sctp.max_message_size == 0 {
        DEFAULT_MAX_MESSAGE_SIZE
    } else {
        sctp.max_message_size
    }
}
