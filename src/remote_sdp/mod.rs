#[cfg(test)]
mod remote_sdp_test;

pub mod media_section;

use std::collections::HashMap;

use sdp::description::common::Attribute;
use sdp::description::media::MediaDescription;
use sdp::description::session::{
    Origin, TimeDescription, Timing, ATTR_KEY_GROUP, ATTR_KEY_ICELITE, ATTR_KEY_MSID_SEMANTIC,
    SEMANTIC_TOKEN_WEBRTC_MEDIA_STREAMS,
};
use sdp::SessionDescription;

pub use media_section::{MediaSection, MediaSectionRole, DATA_CHANNEL_MID};
use media_section::{AnswerSectionParams, OfferSectionParams, SectionTransport};

use crate::dtls_transport::{DtlsParameters, DtlsRole};
use crate::error::{Error, Result};
use crate::ice_transport::{IceCandidate, IceParameters};
use crate::rtp_parameters::{MediaKind, ProducerCodecOptions, RtpCodecParameters, RtpParameters};
use crate::sctp_transport::SctpParameters;

const SDP_USERNAME: &str = "mediasoup-client";
const SDP_SESSION_ID: u64 = 10000;
const ATTR_KEY_FINGERPRINT: &str = "fingerprint";
const BUNDLE_SEMANTIC: &str = "BUNDLE";

/// Parameters the remote description is built from.
#[derive(Default, Debug, Clone)]
pub struct RemoteSdpOptions {
    pub ice_parameters: Option<IceParameters>,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: Option<DtlsParameters>,
    pub sctp_parameters: Option<SctpParameters>,
    /// Plan-B descriptions carry several streams per section.
    pub plan_b: bool,
    /// Hand out closed sections again from get_next_media_section_idx.
    pub reuse_media_sections: bool,
}

/// Where the next section should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSectionIdx {
    pub idx: usize,
    /// Set when `idx` points to a closed section that may be recycled.
    pub reuse_mid: Option<String>,
}

/// Answer to the local offer for one outgoing stream.
#[derive(Debug, Clone)]
pub struct SendParams<'a> {
    /// Sections of the local offer that carry the stream. A simulcast
    /// producer with a secondary low resolution track has two.
    pub offer_media: &'a [MediaDescription],
    pub reuse_mid: Option<&'a str>,
    pub offer_rtp_parameters: &'a RtpParameters,
    pub answer_rtp_parameters: &'a RtpParameters,
    pub codec_options: Option<&'a ProducerCodecOptions>,
    pub extmap_allow_mixed: bool,
}

/// Offer of one incoming stream.
#[derive(Debug, Clone)]
pub struct ReceiveParams<'a> {
    pub mid: &'a str,
    pub kind: MediaKind,
    pub offer_rtp_parameters: &'a RtpParameters,
    pub stream_id: &'a str,
    pub track_id: &'a str,
    pub reuse_mid: Option<&'a str>,
}

/// RemoteSdp keeps the description the remote side would have produced and
/// renders it whenever the local peer needs to apply it.
///
/// Sections live in `media_sections` in description order, and
/// `mid_to_index` always maps every section's mid to its position.
#[derive(Debug)]
pub struct RemoteSdp {
    ice_parameters: Option<IceParameters>,
    ice_candidates: Vec<IceCandidate>,
    dtls_parameters: Option<DtlsParameters>,
    sctp_parameters: Option<SctpParameters>,
    plan_b: bool,
    reuse_media_sections: bool,
    media_sections: Vec<MediaSection>,
    mid_to_index: HashMap<String, usize>,
    first_mid: Option<String>,
    session: SessionDescription,
}

impl RemoteSdp {
    pub fn new(options: RemoteSdpOptions) -> Self {
        let mut session = SessionDescription {
            version: 0,
            origin: Origin {
                username: SDP_USERNAME.to_owned(),
                session_id: SDP_SESSION_ID,
                session_version: 0,
                network_type: "IN".to_owned(),
                address_type: "IP4".to_owned(),
                unicast_address: "0.0.0.0".to_owned(),
            },
            session_name: "-".to_owned(),
            time_descriptions: vec![TimeDescription {
                timing: Timing {
                    start_time: 0,
                    stop_time: 0,
                },
                repeat_times: vec![],
            }],
            ..Default::default()
        };

        if options
            .ice_parameters
            .as_ref()
            .map(|ice| ice.ice_lite)
            .unwrap_or(false)
        {
            session
                .attributes
                .push(Attribute::new(ATTR_KEY_ICELITE.to_owned(), None));
        }

        if let Some(dtls_parameters) = &options.dtls_parameters {
            session.attributes.push(Attribute::new(
                ATTR_KEY_MSID_SEMANTIC.to_owned(),
                Some(format!("{SEMANTIC_TOKEN_WEBRTC_MEDIA_STREAMS} *")),
            ));
            if let Some(fingerprint) = dtls_parameters.last_fingerprint() {
                session.attributes.push(Attribute::new(
                    ATTR_KEY_FINGERPRINT.to_owned(),
                    Some(format!("{} {}", fingerprint.algorithm, fingerprint.value)),
                ));
            }
            session.attributes.push(Attribute::new(
                ATTR_KEY_GROUP.to_owned(),
                Some(BUNDLE_SEMANTIC.to_owned()),
            ));
        }

        RemoteSdp {
            ice_parameters: options.ice_parameters,
            ice_candidates: options.ice_candidates,
            dtls_parameters: options.dtls_parameters,
            sctp_parameters: options.sctp_parameters,
            plan_b: options.plan_b,
            reuse_media_sections: options.reuse_media_sections,
            media_sections: vec![],
            mid_to_index: HashMap::new(),
            first_mid: None,
            session,
        }
    }

    pub fn update_ice_parameters(&mut self, ice_parameters: IceParameters) {
        log::debug!(
            "update_ice_parameters() [ice_parameters:{:?}]",
            ice_parameters
        );

        self.session.attributes.retain(|a| a.key != ATTR_KEY_ICELITE);
        if ice_parameters.ice_lite {
            self.session
                .attributes
                .push(Attribute::new(ATTR_KEY_ICELITE.to_owned(), None));
        }
        for section in &mut self.media_sections {
            section.set_ice_parameters(&ice_parameters);
        }
        self.ice_parameters = Some(ice_parameters);
    }

    pub fn update_dtls_role(&mut self, role: DtlsRole) {
        log::debug!("update_dtls_role() [role:{}]", role);

        if let Some(dtls_parameters) = &mut self.dtls_parameters {
            dtls_parameters.role = role;
        }
        for section in &mut self.media_sections {
            section.set_dtls_role(role);
        }
    }

    /// get_next_media_section_idx returns the first closed section when
    /// reuse is enabled, otherwise the append position.
    pub fn get_next_media_section_idx(&self) -> MediaSectionIdx {
        if self.reuse_media_sections {
            if let Some((idx, section)) = self
                .media_sections
                .iter()
                .enumerate()
                .find(|(_, section)| section.closed())
            {
                return MediaSectionIdx {
                    idx,
                    reuse_mid: Some(section.mid().to_owned()),
                };
            }
        }

        MediaSectionIdx {
            idx: self.media_sections.len(),
            reuse_mid: None,
        }
    }

    /// send answers the local offer sections of one outgoing stream.
    pub fn send(&mut self, params: SendParams<'_>) -> Result<()> {
        for (i, offer_media) in params.offer_media.iter().enumerate() {
            let section = MediaSection::answer(
                self.section_transport(),
                AnswerSectionParams {
                    offer_media,
                    answer_rtp_parameters: Some(params.answer_rtp_parameters),
                    sctp_parameters: None,
                    codec_options: params.codec_options,
                    extmap_allow_mixed: params.extmap_allow_mixed,
                },
            )?;

            let reuse_mid = if i == 0 { params.reuse_mid } else { None };
            if let Some(reuse_mid) = reuse_mid {
                self.replace_media_section(section, Some(reuse_mid))?;
            } else if self.mid_to_index.contains_key(section.mid()) {
                self.replace_media_section(section, None)?;
            } else {
                self.add_media_section(section)?;
            }
        }

        log::trace!(
            "send() | answered {} section(s) [offer_mid:{:?}]",
            params.offer_media.len(),
            params.offer_rtp_parameters.mid
        );

        Ok(())
    }

    /// receive declares one stream the remote side sends. A known mid is
    /// rebuilt in place, never appended twice.
    pub fn receive(&mut self, params: ReceiveParams<'_>) -> Result<()> {
        if let Some(&idx) = self.mid_to_index.get(params.mid) {
            if self.plan_b {
                self.media_sections[idx].plan_b_receive(
                    params.offer_rtp_parameters,
                    params.stream_id,
                    Some(params.track_id),
                );
                self.regenerate_bundle_mids();
                return Ok(());
            }

            let section = self.offer_section(&params)?;
            return self.replace_media_section(section, None);
        }

        let section = self.offer_section(&params)?;
        match params.reuse_mid {
            Some(reuse_mid) => self.replace_media_section(section, Some(reuse_mid)),
            None => self.add_media_section(section),
        }
    }

    /// disable_media_section stops media on a section but keeps its mid.
    pub fn disable_media_section(&mut self, mid: &str) -> Result<()> {
        let idx = self.index_of(mid)?;
        self.media_sections[idx].disable();
        Ok(())
    }

    /// close_media_section makes a section reusable. The first mid anchors
    /// the bundle and is only disabled.
    pub fn close_media_section(&mut self, mid: &str) -> Result<()> {
        let idx = self.index_of(mid)?;

        if self.first_mid.as_deref() == Some(mid) {
            log::debug!(
                "close_media_section() | cannot close first media section, disabling it instead [mid:{}]",
                mid
            );
            self.media_sections[idx].disable();
            return Ok(());
        }

        self.media_sections[idx].close();
        self.regenerate_bundle_mids();
        Ok(())
    }

    pub fn plan_b_stop_receiving(
        &mut self,
        mid: &str,
        offer_rtp_parameters: &RtpParameters,
    ) -> Result<()> {
        let idx = self.index_of(mid)?;
        self.media_sections[idx].plan_b_stop_receiving(offer_rtp_parameters);
        Ok(())
    }

    /// send_sctp_association answers the data channel section of the local
    /// offer.
    pub fn send_sctp_association(&mut self, offer_media: &MediaDescription) -> Result<()> {
        let section = MediaSection::answer(
            self.section_transport(),
            AnswerSectionParams {
                offer_media,
                answer_rtp_parameters: None,
                sctp_parameters: self.sctp_parameters.as_ref(),
                codec_options: None,
                extmap_allow_mixed: false,
            },
        )?;
        self.add_or_replace(section)
    }

    /// receive_sctp_association offers the data channel section.
    pub fn receive_sctp_association(&mut self) -> Result<()> {
        let section = MediaSection::offer(
            self.section_transport(),
            OfferSectionParams {
                mid: DATA_CHANNEL_MID,
                kind: MediaKind::Application,
                offer_rtp_parameters: None,
                sctp_parameters: self.sctp_parameters.as_ref(),
                stream_id: None,
                track_id: None,
            },
        )?;
        self.add_or_replace(section)
    }

    /// reconcile_media_sections covers sections the local description has
    /// but this description lacks. The local peer rejects an answer with
    /// fewer sections than its offer, so every missing mid (other than
    /// `pending_mid`, which the caller is about to receive) gets a disabled
    /// filler section of the same kind. Returns the filled mids.
    pub fn reconcile_media_sections(
        &mut self,
        local_sections: &[(String, MediaKind)],
        pending_mid: Option<&str>,
        filler_codecs: &[RtpCodecParameters],
    ) -> Result<Vec<String>> {
        let pending = match pending_mid {
            Some(mid) if !self.mid_to_index.contains_key(mid) => 1,
            _ => 0,
        };
        if local_sections.len() <= self.media_sections.len() + pending {
            return Ok(vec![]);
        }

        log::debug!(
            "reconcile_media_sections() | local description has {} sections, tracking {}",
            local_sections.len(),
            self.media_sections.len()
        );

        let mut filled = vec![];
        for (mid, kind) in local_sections {
            if self.mid_to_index.contains_key(mid) || Some(mid.as_str()) == pending_mid {
                continue;
            }
            if !kind.is_media() {
                log::warn!(
                    "reconcile_media_sections() | cannot fill a section of kind {} [mid:{}]",
                    kind,
                    mid
                );
                continue;
            }

            let filler = RtpParameters {
                mid: Some(mid.clone()),
                codecs: filler_codecs
                    .iter()
                    .filter(|codec| {
                        MediaKind::from(
                            codec.mime_type.split('/').next().unwrap_or_default(),
                        ) == *kind
                    })
                    .cloned()
                    .collect(),
                ..Default::default()
            };
            let section = MediaSection::offer(
                self.section_transport(),
                OfferSectionParams {
                    mid,
                    kind: *kind,
                    offer_rtp_parameters: Some(&filler),
                    sctp_parameters: None,
                    stream_id: None,
                    track_id: None,
                },
            )?;
            self.add_media_section(section)?;
            self.disable_media_section(mid)?;
            filled.push(mid.clone());
        }

        Ok(filled)
    }

    /// get_sdp renders the description. Every call bumps the session
    /// version. Numeric mids are put back in ascending order, sections with
    /// other mids keep their position.
    pub fn get_sdp(&mut self) -> String {
        self.session.origin.session_version += 1;
        self.sort_media_sections();

        let mut session = self.session.clone();
        session.media_descriptions = self
            .media_sections
            .iter()
            .map(|section| section.media().clone())
            .collect();
        session.marshal()
    }

    pub fn session_version(&self) -> u64 {
        self.session.origin.session_version
    }

    /// mids lists the mid of every section in description order.
    pub fn mids(&self) -> Vec<String> {
        self.media_sections
            .iter()
            .map(|section| section.mid().to_owned())
            .collect()
    }

    pub fn media_section_count(&self) -> usize {
        self.media_sections.len()
    }

    pub fn media_section(&self, mid: &str) -> Option<&MediaSection> {
        self.mid_to_index
            .get(mid)
            .and_then(|&idx| self.media_sections.get(idx))
    }

    pub fn first_mid(&self) -> Option<&str> {
        self.first_mid.as_deref()
    }

    pub fn bundle_mids(&self) -> Vec<String> {
        self.session
            .attributes
            .iter()
            .find(|a| a.key == ATTR_KEY_GROUP)
            .and_then(|a| a.value.as_deref())
            .map(|value| value.split_whitespace().skip(1).map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// is_consistent checks the mid index against the section list.
    pub fn is_consistent(&self) -> bool {
        self.mid_to_index.len() == self.media_sections.len()
            && self
                .media_sections
                .iter()
                .enumerate()
                .all(|(idx, section)| self.mid_to_index.get(section.mid()) == Some(&idx))
    }

    fn section_transport(&self) -> SectionTransport<'_> {
        SectionTransport {
            ice_parameters: self.ice_parameters.as_ref(),
            ice_candidates: &self.ice_candidates,
            dtls_role: self.dtls_parameters.as_ref().map(|dtls| dtls.role),
        }
    }

    fn offer_section(&self, params: &ReceiveParams<'_>) -> Result<MediaSection> {
        MediaSection::offer(
            self.section_transport(),
            OfferSectionParams {
                mid: params.mid,
                kind: params.kind,
                offer_rtp_parameters: Some(params.offer_rtp_parameters),
                sctp_parameters: None,
                stream_id: Some(params.stream_id),
                track_id: Some(params.track_id),
            },
        )
    }

    fn index_of(&self, mid: &str) -> Result<usize> {
        self.mid_to_index
            .get(mid)
            .copied()
            .ok_or_else(|| Error::ErrNotFound(format!("no media section found with mid '{mid}'")))
    }

    fn add_or_replace(&mut self, section: MediaSection) -> Result<()> {
        if self.mid_to_index.contains_key(section.mid()) {
            self.replace_media_section(section, None)
        } else {
            self.add_media_section(section)
        }
    }

    fn add_media_section(&mut self, section: MediaSection) -> Result<()> {
        if self.mid_to_index.contains_key(section.mid()) {
            return Err(Error::ErrParameter(format!(
                "media section with mid '{}' already exists",
                section.mid()
            )));
        }
        if self.first_mid.is_none() {
            self.first_mid = Some(section.mid().to_owned());
        }

        self.mid_to_index
            .insert(section.mid().to_owned(), self.media_sections.len());
        self.media_sections.push(section);
        self.regenerate_bundle_mids();
        Ok(())
    }

    /// replace_media_section swaps `section` into the slot of `reuse_mid`,
    /// or into the slot of its own mid when none is given.
    fn replace_media_section(
        &mut self,
        section: MediaSection,
        reuse_mid: Option<&str>,
    ) -> Result<()> {
        let new_mid = section.mid().to_owned();

        match reuse_mid {
            Some(reuse_mid) => {
                let idx = self.index_of(reuse_mid)?;
                if let Some(&other) = self.mid_to_index.get(&new_mid) {
                    if other != idx {
                        return Err(Error::ErrParameter(format!(
                            "mid '{new_mid}' is already used by another media section"
                        )));
                    }
                }

                self.media_sections[idx] = section;
                self.mid_to_index.remove(reuse_mid);
                self.mid_to_index.insert(new_mid.clone(), idx);
                if self.first_mid.as_deref() == Some(reuse_mid) {
                    self.first_mid = Some(new_mid);
                }
            }
            None => {
                let idx = self.index_of(&new_mid)?;
                self.media_sections[idx] = section;
            }
        }

        self.regenerate_bundle_mids();
        Ok(())
    }

    fn regenerate_bundle_mids(&mut self) {
        if self.dtls_parameters.is_none() {
            return;
        }

        let mut value = BUNDLE_SEMANTIC.to_owned();
        for section in self.media_sections.iter().filter(|s| !s.closed()) {
            value.push(' ');
            value.push_str(section.mid());
        }

        match self
            .session
            .attributes
            .iter_mut()
            .find(|a| a.key == ATTR_KEY_GROUP)
        {
            Some(group) => group.value = Some(value),
            None => self
                .session
                .attributes
                .push(Attribute::new(ATTR_KEY_GROUP.to_owned(), Some(value))),
        }
    }

    fn sort_media_sections(&mut self) {
        let slots: Vec<usize> = self
            .media_sections
            .iter()
            .enumerate()
            .filter(|(_, section)| section.mid().parse::<u64>().is_ok())
            .map(|(idx, _)| idx)
            .collect();

        let mut numeric: Vec<(u64, MediaSection)> = slots
            .iter()
            .filter_map(|&idx| {
                let section = &self.media_sections[idx];
                section
                    .mid()
                    .parse::<u64>()
                    .ok()
                    .map(|n| (n, section.clone()))
            })
            .collect();
        if numeric.windows(2).all(|w| w[0].0 <= w[1].0) {
            return;
        }
        numeric.sort_by_key(|(n, _)| *n);

        for (slot, (_, section)) in slots.into_iter().zip(numeric) {
            self.mid_to_index.insert(section.mid().to_owned(), slot);
            self.media_sections[slot] = section;
        }
        self.regenerate_bundle_mids();
    }
}
