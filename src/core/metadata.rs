use crate::domain::model::AudioMetadata;
use crate::utils::error::Result;
use lofty::file::{FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag, TagType};
use std::path::Path;

const ARTIST_PLACEHOLDERS: &[&str] = &["unknown artist", "unknown", "various artists"];
const TITLE_PLACEHOLDERS: &[&str] = &["unknown title", "unknown", "untitled"];
const ALBUM_PLACEHOLDERS: &[&str] = &["unknown album", "unknown", "various artists", "untitled"];
const GENRE_PLACEHOLDERS: &[&str] = &["unknown genre", "unknown", "various genres", "untitled"];

#[derive(Debug, Clone, Copy)]
enum Field {
    Artist,
    Title,
    Album,
    Genre,
}

/// 用 lofty 讀取 artist/title/album/genre，依檔案類型決定標籤優先順序
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioMetadataParser;

impl AudioMetadataParser {
    pub fn new() -> Self {
        Self
    }

    /// 讀不到時回傳空的 metadata，不中斷上傳流程
    pub fn parse(&self, path: &Path) -> AudioMetadata {
        match self.try_parse(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("⚠️ Could not read tags from {}: {}", path.display(), e);
                AudioMetadata::default()
            }
        }
    }

    pub fn try_parse(&self, path: &Path) -> Result<AudioMetadata> {
        let tagged_file = Probe::open(path)?.guess_file_type()?.read()?;
        let file_type = tagged_file.file_type();
        let primary = [tagged_file.primary_tag_type()];
        let preference = match tag_preference(file_type) {
            [] => &primary[..],
            listed => listed,
        };
        let tags = ordered_tags(tagged_file.tags(), preference);

        tracing::debug!(
            "Reading {:?} tags from {}: {:?}",
            file_type,
            path.display(),
            tags.iter().map(|tag| tag.tag_type()).collect::<Vec<_>>()
        );

        let metadata = metadata_from_tags(&tags);
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        if metadata.is_empty() {
            tracing::info!("No specific artist/title/album/genre metadata found in {}", filename);
        } else {
            tracing::info!(
                "🏷️ Metadata parsed for {}: Artist={:?}, Title={:?}, Album={:?}, Genre={:?}",
                filename,
                metadata.artist,
                metadata.title,
                metadata.album,
                metadata.genre
            );
        }

        Ok(metadata)
    }
}

/// MP3 先看 ID3v2，WAV 先看 RIFF INFO；其他格式交給呼叫端用主要標籤。未列出的標籤排在後面
pub fn tag_preference(file_type: FileType) -> &'static [TagType] {
    match file_type {
        FileType::Mpeg => &[TagType::Id3v2, TagType::Id3v1, TagType::Ape],
        FileType::Wav => &[TagType::RiffInfo, TagType::Id3v2],
        _ => &[],
    }
}

pub fn ordered_tags<'a>(tags: &'a [Tag], preference: &[TagType]) -> Vec<&'a Tag> {
    let mut ordered: Vec<&Tag> = preference
        .iter()
        .filter_map(|wanted| tags.iter().find(|tag| tag.tag_type() == *wanted))
        .collect();

    for tag in tags {
        if !preference.contains(&tag.tag_type()) {
            ordered.push(tag);
        }
    }
    ordered
}

/// 每個欄位取第一個非空值，再濾掉 "Unknown" 之類的佔位值
pub fn metadata_from_tags(tags: &[&Tag]) -> AudioMetadata {
    AudioMetadata {
        artist: clean_field(first_value(tags, Field::Artist), ARTIST_PLACEHOLDERS),
        title: clean_field(first_value(tags, Field::Title), TITLE_PLACEHOLDERS),
        album: clean_field(first_value(tags, Field::Album), ALBUM_PLACEHOLDERS),
        genre: clean_field(first_value(tags, Field::Genre), GENRE_PLACEHOLDERS),
    }
}

fn first_value(tags: &[&Tag], field: Field) -> Option<String> {
    tags.iter().find_map(|tag| {
        let value = match field {
            Field::Artist => tag.artist(),
            Field::Title => tag.title(),
            Field::Album => tag.album(),
            Field::Genre => tag.genre(),
        };
        value
            .map(|v| v.to_string())
            .filter(|v| !v.trim().is_empty())
    })
}

fn clean_field(value: Option<String>, placeholders: &[&str]) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || placeholders.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}
